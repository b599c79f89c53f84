use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::config::Config;
use crate::models::{Bar, BarSeries, Direction, EntryDecision, Signal, Tick, TradeHandle};

pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Create bars from (open, high, low, close) tuples with auto-incrementing
/// 1m timestamps.
pub fn make_bars(data: &[(f64, f64, f64, f64)]) -> BarSeries {
    let base = base_time();

    let bars: Vec<Bar> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Bar {
            timestamp: base + Duration::minutes(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        })
        .collect();

    BarSeries::new(bars)
}

/// Create ticks from (bid, ask) tuples, one second apart.
pub fn make_ticks(data: &[(f64, f64)]) -> Vec<Tick> {
    let base = base_time();

    data.iter()
        .enumerate()
        .map(|(i, &(bid, ask))| Tick {
            timestamp: base + Duration::seconds(i as i64),
            bid,
            ask,
        })
        .collect()
}

/// A signal issued at the shared base time, so it lines up with make_bars.
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

pub fn make_handle(ticket: u64, signal: Signal, sibling_tickets: Vec<u64>) -> TradeHandle {
    TradeHandle {
        ticket,
        signal,
        entry: EntryDecision::market(Some(101.0)),
        executed_price: 101.0,
        market_price_at_signal: Some(101.0),
        opened_at: base_time(),
        sibling_tickets,
    }
}

/// A Config suitable for testing: local bridge, no secret, temp output.
pub fn default_test_config() -> Config {
    let mut lot_overrides = HashMap::new();
    lot_overrides.insert("XAUUSD".to_string(), 0.01);
    lot_overrides.insert("USDJPY".to_string(), 0.04);

    Config {
        bridge_base_url: "http://127.0.0.1:8228".to_string(),
        bridge_shared_secret: String::new(),
        symbol: "XAUUSD".to_string(),
        default_lot: 0.10,
        lot_overrides,
        entry_tolerance: 0.0,
        revalidate_pending: true,
        eval_horizon_minutes: 24 * 60,
        poll_interval_secs: 10,
        close_match_tolerance: 1.0,
        max_open_monitors: 4,
        queue_capacity: 8,
        results_file: std::env::temp_dir()
            .join("signal_sentry_test")
            .join("results.jsonl")
            .to_string_lossy()
            .to_string(),
        log_level: "error".to_string(),
    }
}
