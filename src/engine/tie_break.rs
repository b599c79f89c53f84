use chrono::{DateTime, Utc};

use crate::models::{Direction, OutcomeStatus, Signal, Tick};

pub const NOTE_SL_FIRST: &str = "tie -> SL first (tick)";
pub const NOTE_TP_FIRST: &str = "tie -> TP first (tick)";
pub const NOTE_CONSERVATIVE: &str = "tie -> conservative SL";

#[derive(Debug, Clone, PartialEq)]
pub struct TieBreak {
    pub status: OutcomeStatus,
    pub at: DateTime<Utc>,
    pub note: &'static str,
}

/// Decide which side of an ambiguous bar was touched first by re-scanning
/// its window at tick resolution.
///
/// The SL condition is checked before the TP condition on every tick, so a
/// tick that satisfies both counts as a stop-out. When no tick decides at
/// all (feed gap over the window), the answer is SL: a win is never claimed
/// without tick evidence.
pub fn resolve_tie(signal: &Signal, ticks: &[Tick], bar_time: DateTime<Utc>) -> TieBreak {
    let mut ordered: Vec<&Tick> = ticks.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    for tick in ordered {
        let price = tick.side_price(signal.direction);

        let sl_hit = match signal.direction {
            Direction::Long => price <= signal.stop_loss,
            Direction::Short => price >= signal.stop_loss,
        };
        if sl_hit {
            return TieBreak {
                status: OutcomeStatus::Sl,
                at: tick.timestamp,
                note: NOTE_SL_FIRST,
            };
        }

        let tp_hit = match signal.direction {
            Direction::Long => price >= signal.take_profit,
            Direction::Short => price <= signal.take_profit,
        };
        if tp_hit {
            return TieBreak {
                status: OutcomeStatus::Tp,
                at: tick.timestamp,
                note: NOTE_TP_FIRST,
            };
        }
    }

    TieBreak {
        status: OutcomeStatus::Sl,
        at: bar_time,
        note: NOTE_CONSERVATIVE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_signal, make_ticks};

    #[test]
    fn first_deterministic_tick_wins() {
        // Long, SL 95, TP 110. First tick confirms SL; the later TP tick
        // must not override it.
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        let ticks = make_ticks(&[(94.0, 94.5), (110.5, 111.0)]);

        let tb = resolve_tie(&sig, &ticks, ticks[0].timestamp);
        assert_eq!(tb.status, OutcomeStatus::Sl);
        assert_eq!(tb.at, ticks[0].timestamp);
        assert_eq!(tb.note, NOTE_SL_FIRST);
    }

    #[test]
    fn tp_first_tick_resolves_tp() {
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        let ticks = make_ticks(&[(100.0, 100.5), (110.5, 111.0), (94.0, 94.5)]);

        let tb = resolve_tie(&sig, &ticks, ticks[0].timestamp);
        assert_eq!(tb.status, OutcomeStatus::Tp);
        assert_eq!(tb.at, ticks[1].timestamp);
        assert_eq!(tb.note, NOTE_TP_FIRST);
    }

    #[test]
    fn empty_ticks_fall_back_to_sl() {
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        let bar_time = chrono::Utc::now();

        let tb = resolve_tie(&sig, &[], bar_time);
        assert_eq!(tb.status, OutcomeStatus::Sl);
        assert_eq!(tb.at, bar_time);
        assert_eq!(tb.note, NOTE_CONSERVATIVE);
    }

    #[test]
    fn undecided_ticks_fall_back_to_sl() {
        // Ticks exist but never reach either level.
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        let ticks = make_ticks(&[(100.0, 100.5), (101.0, 101.5)]);

        let tb = resolve_tie(&sig, &ticks, ticks[0].timestamp);
        assert_eq!(tb.status, OutcomeStatus::Sl);
        assert_eq!(tb.note, NOTE_CONSERVATIVE);
    }

    #[test]
    fn sl_checked_before_tp_within_one_tick() {
        // Degenerate tick whose ask satisfies both conditions at once
        // (TP == SL region collapsed by a spike): the SL branch runs first.
        let sig = make_signal(Direction::Long, 100.0, 102.0, 94.0, 95.0);
        let ticks = make_ticks(&[(93.5, 94.0)]);
        let tb = resolve_tie(&sig, &ticks, ticks[0].timestamp);
        assert_eq!(tb.status, OutcomeStatus::Sl);
        assert_eq!(tb.note, NOTE_SL_FIRST);
    }

    #[test]
    fn short_uses_bid_and_mirrors_conditions() {
        let sig = make_signal(Direction::Short, 100.0, 102.0, 90.0, 105.0);
        // Bid touches TP (<= 90) before anything reaches SL.
        let ticks = make_ticks(&[(95.0, 95.5), (89.5, 90.0)]);

        let tb = resolve_tie(&sig, &ticks, ticks[0].timestamp);
        assert_eq!(tb.status, OutcomeStatus::Tp);
        assert_eq!(tb.at, ticks[1].timestamp);
    }
}
