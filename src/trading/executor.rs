use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::broker::{Broker, OrderRequest};
use crate::config::Config;
use crate::engine::{resolve_entry, revalidate_pending};
use crate::models::{Signal, TradeHandle};

/// Turns a validated signal into a broker order and a trade handle for the
/// monitor. Entry decisions are made here, once; pending prices get one
/// revalidation against a fresh quote right before submission.
pub struct TradeExecutor {
    broker: Arc<dyn Broker>,
    cfg: Config,
    /// Pending tickets already placed per message, so later targets of the
    /// same message know their siblings.
    pending_by_message: Mutex<HashMap<i64, Vec<u64>>>,
}

impl TradeExecutor {
    pub fn new(broker: Arc<dyn Broker>, cfg: &Config) -> Self {
        Self {
            broker,
            cfg: cfg.clone(),
            pending_by_message: Mutex::new(HashMap::new()),
        }
    }

    pub async fn execute(&self, signal: &Signal) -> Result<Option<TradeHandle>> {
        signal.validate()?;

        let quote = match self.broker.best_bid_ask(&signal.symbol).await {
            Ok(q) => q,
            Err(e) => {
                warn!("Quote fetch failed for {}: {:#}", signal.symbol, e);
                None
            }
        };

        let mut decision = resolve_entry(
            signal.direction,
            signal.entry_low,
            signal.entry_high,
            quote.as_ref(),
            self.cfg.entry_tolerance,
        );

        if decision.is_pending() && self.cfg.revalidate_pending {
            let fresh = match self.broker.best_bid_ask(&signal.symbol).await {
                Ok(q) => q,
                Err(e) => {
                    warn!("Revalidation quote failed for {}: {:#}", signal.symbol, e);
                    None
                }
            };
            decision = revalidate_pending(decision, signal.direction, fresh.as_ref());
        }

        let request = OrderRequest {
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            kind: decision.kind,
            price: decision.price,
            volume: self.cfg.lot_for(&signal.symbol),
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            comment: match signal.tp_index {
                Some(i) => format!("signal {} tp{}", signal.message_id, i),
                None => format!("signal {}", signal.message_id),
            },
        };

        info!(
            "Placing {} {} order for {}: band [{} - {}], tp={}, sl={}",
            signal.direction,
            decision.kind,
            signal.symbol,
            signal.entry_low,
            signal.entry_high,
            signal.take_profit,
            signal.stop_loss
        );

        let receipt = self.broker.place_order(&request).await?;
        if !receipt.accepted {
            warn!(
                "Order for message {} rejected: {}",
                signal.message_id, receipt.comment
            );
            return Ok(None);
        }

        let ticket = receipt.order;
        let siblings = if decision.is_pending() {
            let mut placed = self.pending_by_message.lock().unwrap();
            let group = placed.entry(signal.message_id).or_default();
            let siblings = group.clone();
            group.push(ticket);
            siblings
        } else {
            Vec::new()
        };

        info!(
            "Order accepted for message {}: ticket={} price={}",
            signal.message_id, ticket, receipt.price
        );

        Ok(Some(TradeHandle {
            ticket,
            signal: signal.clone(),
            entry: decision,
            executed_price: receipt.price,
            market_price_at_signal: quote.map(|q| q.side_price(signal.direction)),
            opened_at: Utc::now(),
            sibling_tickets: siblings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::broker::{
        BrokerPosition, ClosingDeal, OrderReceipt, PendingOrder, Quote,
    };
    use crate::models::{BarSeries, Direction, EntryKind, Tick, Timeframe};
    use crate::test_helpers::{default_test_config, make_signal};

    struct PlacingBroker {
        quote: Option<Quote>,
        accept: bool,
        next_ticket: AtomicU64,
        requests: Mutex<Vec<OrderRequest>>,
    }

    impl PlacingBroker {
        fn new(quote: Option<Quote>) -> Self {
            Self {
                quote,
                accept: true,
                next_ticket: AtomicU64::new(5000),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Broker for PlacingBroker {
        async fn best_bid_ask(&self, _symbol: &str) -> Result<Option<Quote>> {
            Ok(self.quote)
        }

        async fn bars(
            &self,
            _symbol: &str,
            _tf: Timeframe,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<BarSeries> {
            Ok(BarSeries::default())
        }

        async fn ticks(
            &self,
            _symbol: &str,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<Tick>> {
            Ok(Vec::new())
        }

        async fn open_positions(&self, _ticket: u64) -> Result<Vec<BrokerPosition>> {
            Ok(Vec::new())
        }

        async fn closing_deals(&self, _position_id: u64) -> Result<Vec<ClosingDeal>> {
            Ok(Vec::new())
        }

        async fn open_orders(&self, _ticket: u64) -> Result<Vec<PendingOrder>> {
            Ok(Vec::new())
        }

        async fn cancel_order(&self, _ticket: u64) -> Result<bool> {
            Ok(false)
        }

        async fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt> {
            self.requests.lock().unwrap().push(request.clone());
            let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
            Ok(OrderReceipt {
                accepted: self.accept,
                order: ticket,
                deal: ticket,
                price: request.price.unwrap_or(101.0),
                comment: if self.accept { "done" } else { "rejected" }.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn quote_inside_band_places_market_order() {
        let broker = Arc::new(PlacingBroker::new(Some(Quote { bid: 100.5, ask: 101.0 })));
        let executor = TradeExecutor::new(
            Arc::clone(&broker) as Arc<dyn Broker>,
            &default_test_config(),
        );
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);

        let handle = executor.execute(&sig).await.unwrap().unwrap();
        assert_eq!(handle.entry.kind, EntryKind::Market);
        assert!(handle.is_parent());
        assert_eq!(handle.market_price_at_signal, Some(101.0));

        let requests = broker.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, EntryKind::Market);
        assert!((requests[0].volume - 0.01).abs() < 1e-12); // XAUUSD lot override
    }

    #[tokio::test]
    async fn band_above_ask_places_stop_order() {
        let broker = Arc::new(PlacingBroker::new(Some(Quote { bid: 98.5, ask: 99.0 })));
        let executor = TradeExecutor::new(
            Arc::clone(&broker) as Arc<dyn Broker>,
            &default_test_config(),
        );
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);

        let handle = executor.execute(&sig).await.unwrap().unwrap();
        assert_eq!(handle.entry.kind, EntryKind::Stop);
        assert_eq!(handle.entry.price, Some(100.0));
    }

    #[tokio::test]
    async fn rejected_order_yields_no_handle() {
        let mut broker = PlacingBroker::new(Some(Quote { bid: 100.5, ask: 101.0 }));
        broker.accept = false;
        let executor = TradeExecutor::new(Arc::new(broker), &default_test_config());
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);

        assert!(executor.execute(&sig).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn later_targets_of_a_message_become_siblings() {
        let broker = Arc::new(PlacingBroker::new(Some(Quote { bid: 98.5, ask: 99.0 })));
        let executor = TradeExecutor::new(
            Arc::clone(&broker) as Arc<dyn Broker>,
            &default_test_config(),
        );

        let mut first = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        first.tp_index = Some(1);
        let mut second = first.clone();
        second.take_profit = 115.0;
        second.tp_index = Some(2);

        let h1 = executor.execute(&first).await.unwrap().unwrap();
        let h2 = executor.execute(&second).await.unwrap().unwrap();

        assert!(h1.is_parent());
        assert_eq!(h2.sibling_tickets, vec![h1.ticket]);
    }

    #[tokio::test]
    async fn malformed_signal_never_reaches_the_broker() {
        let broker = Arc::new(PlacingBroker::new(Some(Quote { bid: 100.5, ask: 101.0 })));
        let executor = TradeExecutor::new(
            Arc::clone(&broker) as Arc<dyn Broker>,
            &default_test_config(),
        );
        let sig = make_signal(Direction::Long, 102.0, 100.0, 110.0, 95.0);

        assert!(executor.execute(&sig).await.is_err());
        assert!(broker.requests.lock().unwrap().is_empty());
    }
}
