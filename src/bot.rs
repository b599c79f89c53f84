use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::config::SharedConfig;
use crate::models::{Signal, TradeHandle};
use crate::monitor::TradeMonitor;
use crate::storage::OutcomeStore;
use crate::trading::TradeExecutor;

/// Wires the two long-lived loops together: a trader task that turns queued
/// signals into trade handles, and a dispatcher that spawns one monitor task
/// per handle. Monitor count is bounded by a semaphore; shutdown fans out
/// over a watch channel.
pub struct SignalBot {
    config: SharedConfig,
    broker: Arc<dyn Broker>,
    signal_rx: mpsc::Receiver<Signal>,
}

impl SignalBot {
    pub fn new(config: SharedConfig, broker: Arc<dyn Broker>, signal_rx: mpsc::Receiver<Signal>) -> Self {
        Self {
            config,
            broker,
            signal_rx,
        }
    }

    pub async fn run(self) -> Result<()> {
        let cfg = self.config.read().await.clone();

        info!("{}", "=".repeat(60));
        info!("Signal Sentry starting up");
        info!("Bridge: {}", cfg.bridge_base_url);
        info!("Symbol: {}", cfg.symbol);
        info!(
            "Poll interval: {}s | Monitor cap: {} | Results: {}",
            cfg.poll_interval_secs, cfg.max_open_monitors, cfg.results_file
        );
        info!("{}", "=".repeat(60));

        let executor = Arc::new(TradeExecutor::new(Arc::clone(&self.broker), &cfg));
        let store = Arc::new(OutcomeStore::new(&cfg.results_file));
        let monitor = Arc::new(TradeMonitor::new(
            Arc::clone(&self.broker),
            Arc::clone(&store),
            &cfg,
        ));

        let (handle_tx, handle_rx) = mpsc::channel::<TradeHandle>(cfg.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitors = Arc::new(Semaphore::new(cfg.max_open_monitors));

        let trader = tokio::spawn(trader_loop(self.signal_rx, executor, handle_tx));
        let dispatcher = tokio::spawn(dispatch_loop(handle_rx, monitor, monitors, shutdown_rx));

        info!("Bot is now running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;

        info!("Shutting down...");
        shutdown_tx.send(true).ok();
        trader.abort();
        dispatcher.abort();
        info!("Bot stopped.");
        Ok(())
    }
}

/// Consumes signals in arrival order and hands each accepted trade to the
/// dispatcher. A bad signal is dropped with a warning, never executed.
async fn trader_loop(
    mut signal_rx: mpsc::Receiver<Signal>,
    executor: Arc<TradeExecutor>,
    handle_tx: mpsc::Sender<TradeHandle>,
) {
    while let Some(signal) = signal_rx.recv().await {
        if let Err(e) = signal.validate() {
            warn!("Dropping invalid signal {}: {}", signal.message_id, e);
            continue;
        }

        info!(
            "Handling signal {}: {} {} [{} - {}]",
            signal.message_id, signal.symbol, signal.direction, signal.entry_low, signal.entry_high
        );

        match executor.execute(&signal).await {
            Ok(Some(handle)) => {
                if handle_tx.send(handle).await.is_err() {
                    break;
                }
            }
            Ok(None) => warn!("No trade opened for signal {}", signal.message_id),
            Err(e) => error!(
                "Trade execution failed for signal {}: {:#}",
                signal.message_id, e
            ),
        }
    }
    info!("Signal queue closed; trader loop exiting");
}

/// Spawns one monitor task per handle. Each task owns its handle exclusively
/// and holds a semaphore permit for its lifetime.
async fn dispatch_loop(
    mut handle_rx: mpsc::Receiver<TradeHandle>,
    monitor: Arc<TradeMonitor>,
    monitors: Arc<Semaphore>,
    shutdown_rx: watch::Receiver<bool>,
) {
    while let Some(handle) = handle_rx.recv().await {
        let permit = match Arc::clone(&monitors).acquire_owned().await {
            Ok(p) => p,
            Err(_) => break,
        };
        let monitor = Arc::clone(&monitor);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            monitor.monitor_trade(handle, shutdown).await;
        });
    }
    info!("Handle queue closed; dispatcher exiting");
}
