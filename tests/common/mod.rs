use chrono::{DateTime, Utc};

use signal_sentry::config::Config;
use signal_sentry::models::{Direction, Signal};

pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn make_signal(
    direction: Direction,
    entry_low: f64,
    entry_high: f64,
    take_profit: f64,
    stop_loss: f64,
) -> Signal {
    Signal {
        message_id: 4242,
        created_at: base_time(),
        symbol: "XAUUSD".to_string(),
        direction,
        entry_low,
        entry_high,
        take_profit,
        stop_loss,
        tp_index: None,
    }
}

/// Env-derived config pointed at a per-test temp results file.
pub fn test_config(name: &str) -> Config {
    let mut cfg = Config::from_env();
    cfg.bridge_shared_secret = String::new();
    cfg.results_file = std::env::temp_dir()
        .join(format!("signal_sentry_integ_{}_{}", std::process::id(), name))
        .join("results.jsonl")
        .to_string_lossy()
        .to_string();
    let _ = std::fs::remove_file(&cfg.results_file);
    cfg
}
