//! queue CLI: front-desk interface to the repair counter queue.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use repair_queue::announce::{Announcer, LogAnnouncer, VoiceOption, VoicePicker, call_message};
use repair_queue::clock::SystemClock;
use repair_queue::config::Config;
use repair_queue::export;
use repair_queue::model::{CheckIn, CustomerRecord, CustomerStatus};
use repair_queue::storage::DirSlots;
use repair_queue::store::{QueueStore, StoreOptions};
use repair_queue::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "queue", about = "Walk-in queue for the repair counter")]
struct Cli {
    /// Slot directory (overrides QUEUE_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show which voice would be used for announcements
    Voices {
        /// Available voices as name:lang (defaults to configured voices)
        voices: Vec<String>,
    },
    #[command(flatten)]
    Queue(QueueCommand),
}

/// Commands that operate on the stored queue.
#[derive(Subcommand)]
enum QueueCommand {
    /// Check a customer in
    CheckIn {
        name: String,
        device: String,
        phone_number: String,
    },
    /// Call a customer (or the next waiting one) and announce it
    Call {
        /// Customer ID (full id or unique prefix)
        id: Option<String>,
        /// Call the next waiting customer
        #[arg(long, conflicts_with = "id")]
        next: bool,
    },
    /// Remove a customer
    Remove {
        /// Customer ID (full id or unique prefix)
        id: String,
    },
    /// Mark a customer as completed
    Complete {
        /// Customer ID (full id or unique prefix)
        id: String,
    },
    /// Show the next waiting customer
    Next,
    /// List customers
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show queue statistics
    Stats,
    /// Clear the queue according to the configured clear policy
    Clear,
    /// Export a JSON snapshot (and optionally the called-customer CSV report)
    Export {
        /// Output directory (overrides QUEUE_EXPORT_DIR)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the called-customer report
        #[arg(long)]
        report: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let telemetry = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "repair-queue".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let result = match cli.command {
        Command::Voices { voices } => cmd_voices(&config, voices),
        Command::Queue(command) => run(command, &config),
    };

    if let Err(e) = telemetry.shutdown() {
        tracing::warn!(error = %e, "telemetry shutdown failed");
    }
    result
}

fn run(command: QueueCommand, config: &Config) -> anyhow::Result<()> {
    let slots = DirSlots::open(&config.data_dir)?;
    let mut store = QueueStore::open(
        slots,
        SystemClock,
        StoreOptions {
            clear_policy: config.clear_policy,
        },
    );
    store.subscribe(|event| {
        tracing::debug!(seq = event.seq, kind = ?event.kind, "queue event");
    });

    match command {
        QueueCommand::CheckIn {
            name,
            device,
            phone_number,
        } => {
            let record = store.check_in(CheckIn::new(name, device, phone_number)?);
            println!(
                "Checked in: {} ({}), {} waiting",
                record.name,
                record.id.short(),
                store.stats().waiting
            );
        }
        QueueCommand::Call { id, next } => cmd_call(&mut store, config, id, next)?,
        QueueCommand::Remove { id } => {
            let id = store.find_by_prefix(&id)?.id;
            if let Some(removed) = store.remove_customer(id) {
                println!("Removed: {} ({})", removed.name, removed.status);
            }
        }
        QueueCommand::Complete { id } => {
            let id = store.find_by_prefix(&id)?.id;
            match store.complete_customer(id) {
                Some(record) => println!("Completed: {}", record.name),
                None => println!("Customer is already completed."),
            }
        }
        QueueCommand::Next => match store.next_customer() {
            Some(record) => print_record(record),
            None => println!("No customers waiting."),
        },
        QueueCommand::List { status } => cmd_list(&store, status)?,
        QueueCommand::Stats => {
            let stats = store.stats();
            println!("Waiting:     {}", stats.waiting);
            println!("Called:      {}", stats.called);
            println!("Completed:   {}", stats.completed);
            println!("Total today: {}", stats.total_today);
        }
        QueueCommand::Clear => {
            let removed = store.clear_queue();
            println!(
                "Cleared {removed} customer(s) (policy: {}), {} remaining.",
                store.clear_policy(),
                store.stats().total_today
            );
        }
        QueueCommand::Export { out, report } => {
            let dir = out.unwrap_or_else(|| config.export_dir.clone());
            let snapshot = store.export_snapshot();
            let path = export::write_snapshot(&dir, &config.export_prefix, &snapshot)?;
            println!("Snapshot: {}", path.display());
            if report {
                let path = export::write_report(
                    &dir,
                    &config.export_prefix,
                    store.customers(),
                    snapshot.exported_at,
                )?;
                println!("Report:   {}", path.display());
            }
        }
    }

    Ok(())
}

fn cmd_call(
    store: &mut QueueStore,
    config: &Config,
    id: Option<String>,
    next: bool,
) -> anyhow::Result<()> {
    let id = match (id, next) {
        (Some(prefix), _) => store.find_by_prefix(&prefix)?.id,
        (None, true) => match store.next_customer() {
            Some(record) => record.id,
            None => {
                println!("No customers waiting.");
                return Ok(());
            }
        },
        (None, false) => anyhow::bail!("give a customer id or --next"),
    };

    let Some(record) = store.call_customer(id) else {
        println!("Customer is already completed and cannot be called.");
        return Ok(());
    };

    let mut announcer = LogAnnouncer::new(config.voice.clone(), config.voices.clone());
    let message = call_message(&record);
    match announcer.announce(&message) {
        Some(utterance) => println!("Announce: {}", utterance.text),
        None => println!("Called: {}", record.name),
    }
    Ok(())
}

fn cmd_list(store: &QueueStore, status: Option<String>) -> anyhow::Result<()> {
    let status_filter: Option<CustomerStatus> = match status {
        Some(s) => Some(
            s.parse()
                .map_err(|_| anyhow::anyhow!("invalid status: {s}"))?,
        ),
        None => None,
    };

    let records: Vec<_> = store
        .customers()
        .iter()
        .filter(|r| status_filter.is_none_or(|s| r.status == s))
        .collect();

    if records.is_empty() {
        println!("No customers found.");
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{:<8}  {:<20}  {:<20}  {:<14}  {:<9}  {:>5}  CHECKED IN",
        "ID", "NAME", "DEVICE", "PHONE", "STATUS", "WAIT"
    );
    println!("{}", "-".repeat(100));

    for record in &records {
        println!(
            "{:<8}  {:<20}  {:<20}  {:<14}  {:<9}  {:>5}  {}",
            record.id.short(),
            truncate(&record.name, 20),
            truncate(&record.device, 20),
            truncate(&record.phone_number, 14),
            record.status,
            format!("{}m", export::wait_minutes(record, now)),
            record.checked_in_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!("\n{} customer(s)", records.len());
    Ok(())
}

fn cmd_voices(config: &Config, voices: Vec<String>) -> anyhow::Result<()> {
    let voices: Vec<VoiceOption> = if voices.is_empty() {
        config.voices.clone()
    } else {
        voices
            .iter()
            .map(|v| v.parse())
            .collect::<Result<_, _>>()?
    };

    match VoicePicker::for_settings(&config.voice).pick(&voices) {
        Some(voice) => println!("{} ({})", voice.name, voice.lang),
        None => println!("No suitable voice; the platform default will be used."),
    }
    Ok(())
}

fn print_record(record: &CustomerRecord) {
    println!("ID:         {}", record.id);
    println!("Name:       {}", record.name);
    println!("Device:     {}", record.device);
    println!("Phone:      {}", record.phone_number);
    println!("Status:     {}", record.status);
    println!("Checked in: {}", record.checked_in_at);
    if let Some(called) = record.called_at {
        println!("Called at:  {called}");
    }
    println!(
        "Waited:     {} min",
        export::wait_minutes(record, Utc::now())
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}
