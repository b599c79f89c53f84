use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use signal_sentry::broker::RestBroker;
use signal_sentry::config::Config;
use signal_sentry::engine::Evaluator;
use signal_sentry::models::{OutcomeRow, Signal};
use signal_sentry::storage::OutcomeStore;

/// Replays a file of already-parsed signals against the bridge's history
/// endpoints and appends one outcome row per signal.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let signals_file = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "var/signals.json".to_string());

    let content = std::fs::read_to_string(&signals_file)
        .with_context(|| format!("Failed to read {}", signals_file))?;
    let signals: Vec<Signal> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse signals from {}", signals_file))?;

    println!(
        "Evaluating {} signals over a {}-minute horizon",
        signals.len(),
        cfg.eval_horizon_minutes
    );

    let broker = Arc::new(RestBroker::new(&cfg));
    let evaluator = Evaluator::new(broker, &cfg);
    let store = OutcomeStore::new(&cfg.results_file);

    let mut written = 0usize;
    for signal in &signals {
        match evaluator.evaluate(signal).await {
            Ok(outcome) => {
                store.append(&OutcomeRow::from_evaluation(signal, &outcome))?;
                written += 1;
            }
            Err(e) => warn!("Skipping signal {}: {:#}", signal.message_id, e),
        }
    }

    println!("Wrote {} results to {}", written, cfg.results_file);
    Ok(())
}
