use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedConfig = Arc<RwLock<Config>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Broker bridge
    pub bridge_base_url: String,
    pub bridge_shared_secret: String,

    // Instrument
    pub symbol: String,

    // Order sizing
    pub default_lot: f64,
    pub lot_overrides: HashMap<String, f64>,

    // Entry decision
    pub entry_tolerance: f64,
    pub revalidate_pending: bool,

    // Offline evaluation
    pub eval_horizon_minutes: i64,

    // Live monitoring
    pub poll_interval_secs: u64,
    pub close_match_tolerance: f64,
    pub max_open_monitors: usize,
    pub queue_capacity: usize,

    // Output
    pub results_file: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let mut lot_overrides = HashMap::new();
        lot_overrides.insert("XAUUSD".to_string(), 0.01);
        lot_overrides.insert("USDJPY".to_string(), 0.04);

        Config {
            bridge_base_url: env("BRIDGE_BASE_URL", "http://127.0.0.1:8228"),
            bridge_shared_secret: env("BRIDGE_SHARED_SECRET", ""),
            symbol: env("SYMBOL", "XAUUSD"),
            default_lot: env("DEFAULT_LOT_SIZE", "0.01").parse().unwrap_or(0.01),
            lot_overrides,
            entry_tolerance: env("ENTRY_TOLERANCE", "0.0").parse().unwrap_or(0.0),
            revalidate_pending: env("REVALIDATE_PENDING", "true").to_lowercase() == "true",
            eval_horizon_minutes: env("EVAL_HORIZON_MINUTES", "1440").parse().unwrap_or(1440),
            poll_interval_secs: env("POLL_INTERVAL_SECS", "10").parse().unwrap_or(10),
            close_match_tolerance: env("CLOSE_MATCH_TOLERANCE", "1.0").parse().unwrap_or(1.0),
            max_open_monitors: env("MAX_OPEN_MONITORS", "32").parse().unwrap_or(32),
            queue_capacity: env("QUEUE_CAPACITY", "64").parse().unwrap_or(64),
            results_file: env("RESULTS_FILE", "var/signal_results.jsonl"),
            log_level: env("LOG_LEVEL", "info"),
        }
    }

    pub fn lot_for(&self, symbol: &str) -> f64 {
        self.lot_overrides
            .get(&symbol.to_uppercase())
            .copied()
            .unwrap_or(self.default_lot)
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}
