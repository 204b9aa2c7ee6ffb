use std::path::PathBuf;

use repair_queue::config::{Config, DEFAULT_DATA_DIR};
use repair_queue::model::ClearPolicy;

const ENV_VARS: [&str; 5] = [
    "QUEUE_CONFIG",
    "QUEUE_DATA_DIR",
    "QUEUE_CLEAR_POLICY",
    "QUEUE_EXPORT_PREFIX",
    "LOG_LEVEL",
];

fn clear_env() {
    for var in ENV_VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }
}

#[test]
fn toml_file_overrides_defaults() {
    let config = Config::from_toml_str(
        r#"
        data_dir = "/var/lib/queue"
        clear_policy = "all"
        export_prefix = "counter"

        [voice]
        enabled = false
        rate = 25.0

        [[voices]]
        name = "Karen"
        lang = "en-AU"
        "#,
    )
    .unwrap();

    assert_eq!(config.data_dir, PathBuf::from("/var/lib/queue"));
    assert_eq!(config.clear_policy, ClearPolicy::All);
    assert_eq!(config.export_prefix, "counter");
    assert!(!config.voice.enabled);
    assert_eq!(config.voice.rate, 10.0); // clamped
    assert_eq!(config.voice.volume, 0.9); // default kept
    assert_eq!(config.voices.len(), 1);
    assert_eq!(config.log_level, "info");
}

#[test]
fn toml_rejects_unknown_keys_and_policies() {
    assert!(Config::from_toml_str("colour = \"blue\"").is_err());
    assert!(Config::from_toml_str("clear_policy = \"everything\"").is_err());
}

#[test]
fn empty_toml_gives_defaults() {
    assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
}

// Environment is process-global, so all env cases run in one test.
#[test]
fn config_from_env_layers_file_and_vars() {
    clear_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    assert_eq!(config.clear_policy, ClearPolicy::WaitingOnly);

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("queue.toml");
    std::fs::write(&file, "clear_policy = \"all\"\nexport_prefix = \"from-file\"\n").unwrap();

    unsafe {
        std::env::set_var("QUEUE_CONFIG", &file);
        std::env::set_var("QUEUE_DATA_DIR", "/tmp/queue-env");
        std::env::set_var("QUEUE_EXPORT_PREFIX", "from-env");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.clear_policy, ClearPolicy::All);
    assert_eq!(config.export_prefix, "from-env");
    assert_eq!(config.data_dir, PathBuf::from("/tmp/queue-env"));

    unsafe {
        std::env::set_var("QUEUE_CLEAR_POLICY", "waiting_only");
    }
    assert_eq!(
        Config::from_env().unwrap().clear_policy,
        ClearPolicy::WaitingOnly
    );

    unsafe {
        std::env::set_var("QUEUE_CLEAR_POLICY", "sometimes");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::remove_var("QUEUE_CLEAR_POLICY");
        std::env::set_var("QUEUE_CONFIG", dir.path().join("missing.toml"));
    }
    assert!(Config::from_env().is_err());

    clear_env();
}
