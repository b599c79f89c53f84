use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::broker::{
    Broker, BrokerPosition, ClosingDeal, OrderReceipt, OrderRequest, PendingOrder, Quote,
};
use crate::models::{Bar, BarSeries, Tick, Timeframe};

/// A Broker backed by pre-loaded historical data. History queries answer
/// from memory; everything trade-shaped is inert, so offline evaluation can
/// run against the same boundary the live path uses.
#[derive(Default)]
pub struct ReplayBroker {
    bars: HashMap<(String, Timeframe), Vec<Bar>>,
    ticks: HashMap<String, Vec<Tick>>,
    quotes: HashMap<String, Quote>,
}

impl ReplayBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load bars for one symbol/timeframe. Input order does not matter;
    /// bars are stored oldest-first.
    pub fn load_bars(&mut self, symbol: &str, tf: Timeframe, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.timestamp);
        self.bars.insert((symbol.to_string(), tf), bars);
    }

    pub fn load_ticks(&mut self, symbol: &str, mut ticks: Vec<Tick>) {
        ticks.sort_by_key(|t| t.timestamp);
        self.ticks.insert(symbol.to_string(), ticks);
    }

    pub fn set_quote(&mut self, symbol: &str, quote: Quote) {
        self.quotes.insert(symbol.to_string(), quote);
    }
}

#[async_trait]
impl Broker for ReplayBroker {
    async fn best_bid_ask(&self, symbol: &str) -> Result<Option<Quote>> {
        Ok(self.quotes.get(symbol).copied())
    }

    async fn bars(
        &self,
        symbol: &str,
        tf: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BarSeries> {
        let bars = self
            .bars
            .get(&(symbol.to_string(), tf))
            .map(|all| {
                all.iter()
                    .filter(|b| b.timestamp >= from && b.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(BarSeries::new(bars))
    }

    async fn ticks(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Tick>> {
        Ok(self
            .ticks
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|t| t.timestamp >= from && t.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
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

    async fn place_order(&self, _request: &OrderRequest) -> Result<OrderReceipt> {
        anyhow::bail!("Replay broker cannot place orders")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_bars, make_ticks};
    use chrono::Duration;

    #[tokio::test]
    async fn bars_filtered_to_range_and_sorted() {
        let series = make_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 112.0, 104.0, 110.0),
        ]);
        let first_ts = series.first().unwrap().timestamp;

        let mut replay = ReplayBroker::new();
        // Load in reverse to prove loading sorts.
        let mut reversed: Vec<_> = series.iter().cloned().collect();
        reversed.reverse();
        replay.load_bars("XAUUSD", Timeframe::M1, reversed);

        let got = replay
            .bars(
                "XAUUSD",
                Timeframe::M1,
                first_ts,
                first_ts + Duration::minutes(1),
            )
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].timestamp, first_ts);
    }

    #[tokio::test]
    async fn unknown_symbol_yields_empty() {
        let replay = ReplayBroker::new();
        let got = replay
            .bars("EURUSD", Timeframe::M1, Utc::now(), Utc::now())
            .await
            .unwrap();
        assert!(got.is_empty());

        let ticks = replay.ticks("EURUSD", Utc::now(), Utc::now()).await.unwrap();
        assert!(ticks.is_empty());
    }

    #[tokio::test]
    async fn ticks_filtered_to_window() {
        let ticks = make_ticks(&[(99.0, 99.5), (100.0, 100.5), (101.0, 101.5)]);
        let first_ts = ticks[0].timestamp;

        let mut replay = ReplayBroker::new();
        replay.load_ticks("XAUUSD", ticks);

        let got = replay
            .ticks("XAUUSD", first_ts, first_ts + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
    }
}
