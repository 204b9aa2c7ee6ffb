//! Export: JSON snapshots of the whole queue and a CSV report of called
//! customers with their wait times.
//!
//! Read-only consumers of the store. Dates in file names and in the snapshot
//! are UTC.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::model::{CustomerRecord, CustomerStatus, QueueStats};

/// Default prefix for export file names.
pub const DEFAULT_EXPORT_PREFIX: &str = "repair-queue";

/// Point-in-time copy of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub customers: Vec<CustomerRecord>,
    pub stats: QueueStats,
    pub exported_at: DateTime<Utc>,
    /// Human-readable export date, `dd/mm/yyyy`.
    pub date: String,
}

impl ExportSnapshot {
    pub fn new(customers: Vec<CustomerRecord>, stats: QueueStats, at: DateTime<Utc>) -> Self {
        Self {
            customers,
            stats,
            exported_at: at,
            date: at.format("%d/%m/%Y").to_string(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `{prefix}-YYYY-MM-DD.json`
pub fn snapshot_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-{}.json", at.format("%Y-%m-%d"))
}

/// `{prefix}-called-YYYY-MM-DD.csv`
pub fn report_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}-called-{}.csv", at.format("%Y-%m-%d"))
}

/// Write a snapshot into `dir`. Returns the file path.
pub fn write_snapshot(dir: &Path, prefix: &str, snapshot: &ExportSnapshot) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(prefix, snapshot.exported_at));
    std::fs::write(&path, snapshot.to_json_pretty()?)?;
    info!(path = %path.display(), customers = snapshot.customers.len(), "snapshot exported");
    Ok(path)
}

/// Write the called-customer report into `dir`. Returns the file path.
pub fn write_report(
    dir: &Path,
    prefix: &str,
    records: &[CustomerRecord],
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(prefix, now));
    std::fs::write(&path, called_report_csv(records, now))?;
    info!(path = %path.display(), "called report exported");
    Ok(path)
}

/// Whole minutes the customer waited: until called, or until `now` if not
/// called yet. Never negative.
pub fn wait_minutes(record: &CustomerRecord, now: DateTime<Utc>) -> i64 {
    let end = record.called_at.unwrap_or(now);
    (end - record.checked_in_at).num_minutes().max(0)
}

const REPORT_HEADER: [&str; 7] = [
    "Name",
    "Device",
    "Phone Number",
    "Checked In",
    "Called At",
    "Wait (mins)",
    "Status",
];

/// CSV of the called subset, in check-in order.
pub fn called_report_csv(records: &[CustomerRecord], now: DateTime<Utc>) -> String {
    let mut out = csv_row(REPORT_HEADER.iter().map(|h| h.to_string()));
    for record in records
        .iter()
        .filter(|r| r.status == CustomerStatus::Called)
    {
        out.push_str(&csv_row([
            record.name.clone(),
            record.device.clone(),
            record.phone_number.clone(),
            format_timestamp(record.checked_in_at),
            record.called_at.map(format_timestamp).unwrap_or_default(),
            wait_minutes(record, now).to_string(),
            record.status.to_string(),
        ]));
    }
    out
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn csv_row(fields: impl IntoIterator<Item = String>) -> String {
    let mut row = fields
        .into_iter()
        .map(|f| csv_field(&f))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

/// RFC 4180 quoting: wrap in quotes when the field holds a delimiter, quote
/// or line break; double embedded quotes.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(csv_field("Pixel 7"), "Pixel 7");
    }

    #[test]
    fn delimiters_and_quotes_are_escaped() {
        assert_eq!(csv_field("Smith, Jo"), "\"Smith, Jo\"");
        assert_eq!(csv_field("6\" screen"), "\"6\"\" screen\"");
    }
}
