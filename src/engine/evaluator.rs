use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::config::Config;
use crate::engine::entry::resolve_entry;
use crate::engine::tie_break::resolve_tie;
use crate::engine::walker::{walk_bars, BarScan};
use crate::models::{BarSeries, EntryKind, Outcome, Signal, Timeframe};

const NOTE_NO_QUOTE: &str = "no quote at decision time";

/// Answers "did TP or SL happen first?" for a signal against the historical
/// record: entry decision from the quote, a forward walk over 1m bars, and a
/// tick re-scan when one bar touches both levels.
pub struct Evaluator {
    broker: Arc<dyn Broker>,
    horizon: Duration,
    entry_tolerance: f64,
}

impl Evaluator {
    pub fn new(broker: Arc<dyn Broker>, cfg: &Config) -> Self {
        Self {
            broker,
            horizon: Duration::minutes(cfg.eval_horizon_minutes),
            entry_tolerance: cfg.entry_tolerance,
        }
    }

    pub async fn evaluate(&self, signal: &Signal) -> Result<Outcome> {
        signal.validate()?;

        let quote = match self.broker.best_bid_ask(&signal.symbol).await {
            Ok(q) => q,
            Err(e) => {
                warn!("Quote fetch failed for {}: {:#}", signal.symbol, e);
                None
            }
        };

        let decision = resolve_entry(
            signal.direction,
            signal.entry_low,
            signal.entry_high,
            quote.as_ref(),
            self.entry_tolerance,
        );
        let degraded = decision.kind == EntryKind::Market && decision.price.is_none();

        let from = signal.created_at;
        let to = signal.created_at + self.horizon;
        let bars = match self.broker.bars(&signal.symbol, Timeframe::M1, from, to).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Bar fetch failed for {}: {:#}", signal.symbol, e);
                BarSeries::default()
            }
        };

        debug!(
            "Evaluating message {} over {} bars ({} entry)",
            signal.message_id,
            bars.len(),
            decision.kind
        );

        let outcome = match walk_bars(signal, &decision, &bars, self.horizon) {
            BarScan::Hit { status, at } => {
                Outcome::resolved(status, at, decision.clone(), note_with(degraded, ""))
            }
            BarScan::Tie { bar } => {
                let window_end = bar.timestamp + Duration::minutes(1);
                let ticks = match self
                    .broker
                    .ticks(&signal.symbol, bar.timestamp, window_end)
                    .await
                {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("Tick fetch failed for {}: {:#}", signal.symbol, e);
                        Vec::new()
                    }
                };
                let tie = resolve_tie(signal, &ticks, bar.timestamp);
                Outcome::resolved(tie.status, tie.at, decision.clone(), note_with(degraded, tie.note))
            }
            BarScan::NoEntry => Outcome::unresolved(decision.clone(), note_with(degraded, "no entry")),
            BarScan::Timeout => Outcome::unresolved(decision.clone(), note_with(degraded, "timeout")),
            BarScan::NoData => Outcome::unresolved(decision.clone(), note_with(degraded, "no data")),
        };

        Ok(outcome)
    }
}

fn note_with(degraded: bool, base: &str) -> String {
    match (degraded, base.is_empty()) {
        (false, _) => base.to_string(),
        (true, true) => NOTE_NO_QUOTE.to_string(),
        (true, false) => format!("{}; {}", base, NOTE_NO_QUOTE),
    }
}
