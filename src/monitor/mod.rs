use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::config::Config;
use crate::models::{Outcome, OutcomeRow, OutcomeStatus, Resolution, TradeHandle};
use crate::storage::OutcomeStore;

/// Where a monitored trade stands between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Broker still reports the position live.
    Open,
    /// Position gone, waiting for the closing deal to show up in history.
    Closed,
}

/// Classify a live close by how near the closing price landed to the
/// take-profit level. Deliberately cruder than the bar-walk predicates: the
/// broker already picked the exit, this only labels it.
pub fn classify_close(take_profit: f64, close_price: f64, tolerance: f64) -> OutcomeStatus {
    if (close_price - take_profit).abs() <= tolerance {
        OutcomeStatus::Tp
    } else {
        OutcomeStatus::Sl
    }
}

/// Watches one live trade until the broker stops reporting it open, then
/// classifies the closing deal, records exactly one outcome row, and cleans
/// up sibling pending orders after a take-profit.
pub struct TradeMonitor {
    broker: Arc<dyn Broker>,
    store: Arc<OutcomeStore>,
    poll_interval: Duration,
    close_match_tolerance: f64,
}

impl TradeMonitor {
    pub fn new(broker: Arc<dyn Broker>, store: Arc<OutcomeStore>, cfg: &Config) -> Self {
        Self {
            broker,
            store,
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            close_match_tolerance: cfg.close_match_tolerance,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// One poll step. Collaborator failures log and read as "still pending";
    /// the next poll retries.
    pub async fn poll_once(
        &self,
        handle: &TradeHandle,
        state: MonitorState,
    ) -> (MonitorState, Resolution) {
        match self.broker.open_positions(handle.ticket).await {
            Ok(positions) if !positions.is_empty() => {
                return (MonitorState::Open, Resolution::Pending)
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Position poll failed for ticket {}: {:#}", handle.ticket, e);
                return (state, Resolution::Pending);
            }
        }

        let deals = match self.broker.closing_deals(handle.ticket).await {
            Ok(d) => d,
            Err(e) => {
                warn!("Deal lookup failed for ticket {}: {:#}", handle.ticket, e);
                return (MonitorState::Closed, Resolution::Pending);
            }
        };

        // History can lag the position feed by a poll or two.
        let deal = match deals.last() {
            Some(d) => d,
            None => return (MonitorState::Closed, Resolution::Pending),
        };

        let status = classify_close(
            handle.signal.take_profit,
            deal.price,
            self.close_match_tolerance,
        );
        let note = format!(
            "deal {} closed at {:.2} ({} by close-price match)",
            deal.deal_id, deal.price, status
        );

        let outcome = Outcome {
            status,
            hit_time: Some(deal.closed_at),
            entry: handle.entry.clone(),
            note,
            profit: Some(deal.profit),
        };
        (MonitorState::Closed, Resolution::Resolved(outcome))
    }

    /// Run until the position closes or shutdown is signalled. Emits exactly
    /// one outcome row per handle; returns `None` only on shutdown.
    pub async fn monitor_trade(
        &self,
        handle: TradeHandle,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<Outcome> {
        info!(
            "Monitoring ticket={} symbol={} side={} siblings={:?}",
            handle.ticket,
            handle.signal.symbol,
            handle.signal.direction,
            handle.sibling_tickets
        );

        let mut state = MonitorState::Open;
        loop {
            let (next, resolution) = self.poll_once(&handle, state).await;
            if next != state {
                debug!("Ticket {}: {:?} -> {:?}", handle.ticket, state, next);
                state = next;
            }

            if let Resolution::Resolved(outcome) = resolution {
                if let Err(e) = self.store.append(&OutcomeRow::from_trade(&handle, &outcome)) {
                    error!(
                        "Failed to record outcome for ticket {}: {:#}",
                        handle.ticket, e
                    );
                }

                if outcome.status == OutcomeStatus::Tp && !handle.sibling_tickets.is_empty() {
                    self.cancel_siblings(&handle).await;
                }

                info!(
                    "Finished monitoring ticket={} result={}",
                    handle.ticket, outcome.status
                );
                return Some(outcome);
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Monitor for ticket {} stopped before resolution", handle.ticket);
                        return None;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Best-effort cancellation of every sibling still live. Failures are
    /// logged and skipped; the recorded outcome stands either way.
    async fn cancel_siblings(&self, handle: &TradeHandle) {
        for &ticket in &handle.sibling_tickets {
            let live = match self.broker.open_orders(ticket).await {
                Ok(orders) => !orders.is_empty(),
                Err(e) => {
                    warn!("Order lookup failed for sibling {}: {:#}", ticket, e);
                    // Lookup failed; attempt the cancel anyway.
                    true
                }
            };
            if !live {
                debug!("Sibling {} already gone; nothing to cancel", ticket);
                continue;
            }

            match self.broker.cancel_order(ticket).await {
                Ok(true) => info!("Cancelled sibling order {}", ticket),
                Ok(false) => warn!("Broker refused to cancel sibling order {}", ticket),
                Err(e) => error!("Failed to cancel sibling order {}: {:#}", ticket, e),
            }
        }
    }
}
