use chrono::{DateTime, Duration, Utc};

use crate::models::{Bar, BarSeries, Direction, EntryDecision, EntryKind, OutcomeStatus, Signal};

/// What a forward scan over the bar record concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum BarScan {
    /// Exactly one of TP/SL was touched first, in the bar stamped `at`.
    Hit {
        status: OutcomeStatus,
        at: DateTime<Utc>,
    },
    /// TP and SL were both touched inside one bar; tick data has to decide.
    Tie { bar: Bar },
    /// A pending entry was never triggered before the record ran out.
    NoEntry,
    /// The position went active but neither level was touched in time.
    Timeout,
    /// Nothing to scan.
    NoData,
}

/// Walk bars forward from signal issuance until TP or SL is touched.
///
/// Pure function of its inputs: same signal, same decision, same bars, same
/// answer. Bars are sorted by timestamp before the walk, so callers handing
/// over unordered data get the documented behavior rather than garbage.
pub fn walk_bars(
    signal: &Signal,
    decision: &EntryDecision,
    bars: &BarSeries,
    horizon: Duration,
) -> BarScan {
    if bars.is_empty() {
        return BarScan::NoData;
    }

    let mut ordered: Vec<&Bar> = bars.iter().collect();
    ordered.sort_by_key(|b| b.timestamp);

    let deadline = signal.created_at + horizon;
    let mut in_trade = decision.kind == EntryKind::Market;

    for bar in ordered {
        if bar.timestamp < signal.created_at {
            continue;
        }
        if bar.timestamp > deadline {
            break;
        }

        // The entry trigger is its own predicate, checked on every bar until
        // it fires; the activating bar itself is still scanned for targets.
        if !in_trade {
            if let Some(entry_price) = decision.price {
                in_trade = entry_triggered(signal.direction, bar, entry_price);
            }
        }
        if !in_trade {
            continue;
        }

        let tp = tp_touched(signal, bar);
        let sl = sl_touched(signal, bar);

        match (tp, sl) {
            (true, true) => return BarScan::Tie { bar: bar.clone() },
            (true, false) => {
                return BarScan::Hit {
                    status: OutcomeStatus::Tp,
                    at: bar.timestamp,
                }
            }
            (false, true) => {
                return BarScan::Hit {
                    status: OutcomeStatus::Sl,
                    at: bar.timestamp,
                }
            }
            (false, false) => {}
        }
    }

    if !in_trade && decision.is_pending() {
        BarScan::NoEntry
    } else {
        BarScan::Timeout
    }
}

fn entry_triggered(direction: Direction, bar: &Bar, entry_price: f64) -> bool {
    match direction {
        Direction::Long => bar.reaches_up_to(entry_price),
        Direction::Short => bar.reaches_down_to(entry_price),
    }
}

fn tp_touched(signal: &Signal, bar: &Bar) -> bool {
    match signal.direction {
        Direction::Long => bar.reaches_up_to(signal.take_profit),
        Direction::Short => bar.reaches_down_to(signal.take_profit),
    }
}

fn sl_touched(signal: &Signal, bar: &Bar) -> bool {
    match signal.direction {
        Direction::Long => bar.reaches_down_to(signal.stop_loss),
        Direction::Short => bar.reaches_up_to(signal.stop_loss),
    }
}
