use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use signal_sentry::bot::SignalBot;
use signal_sentry::broker::{Broker, RestBroker};
use signal_sentry::config::Config;
use signal_sentry::models::Signal;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let broker: Arc<dyn Broker> = Arc::new(RestBroker::new(&cfg));
    let (signal_tx, signal_rx) = mpsc::channel::<Signal>(cfg.queue_capacity);

    // Parsed signals arrive as JSON lines on stdin; the listener that turns
    // raw messages into signals runs as a separate process and pipes here.
    tokio::spawn(read_signals_from_stdin(signal_tx));

    let bot = SignalBot::new(cfg.shared(), broker, signal_rx);
    bot.run().await
}

async fn read_signals_from_stdin(signal_tx: mpsc::Sender<Signal>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Signal>(line) {
                    Ok(signal) => {
                        if signal_tx.send(signal).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Unreadable signal line: {}", e),
                }
            }
            Ok(None) => {
                info!("Signal input closed");
                return;
            }
            Err(e) => {
                warn!("Signal input error: {}", e);
                return;
            }
        }
    }
}
