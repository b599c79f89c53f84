use crate::broker::Quote;
use crate::models::{Direction, EntryDecision, EntryKind};

/// Decide how a signal's entry band relates to the current market.
///
/// With no quote the only honest answer is a best-effort market entry; the
/// caller records the degraded confidence. Otherwise a band strictly beyond
/// the working price (by more than `tolerance`) becomes a stop order at the
/// near edge, a band strictly behind it becomes a limit order at the far
/// edge, and a price already inside the band fills at market.
pub fn resolve_entry(
    direction: Direction,
    entry_low: f64,
    entry_high: f64,
    quote: Option<&Quote>,
    tolerance: f64,
) -> EntryDecision {
    let quote = match quote {
        Some(q) => q,
        None => return EntryDecision::market(None),
    };

    match direction {
        Direction::Long => {
            let ask = quote.ask;
            if entry_low > ask + tolerance {
                EntryDecision::stop(entry_low)
            } else if entry_high < ask - tolerance {
                EntryDecision::limit(entry_high)
            } else {
                EntryDecision::market(Some(ask))
            }
        }
        Direction::Short => {
            let bid = quote.bid;
            if entry_high < bid - tolerance {
                EntryDecision::stop(entry_high)
            } else if entry_low > bid + tolerance {
                EntryDecision::limit(entry_low)
            } else {
                EntryDecision::market(Some(bid))
            }
        }
    }
}

/// Re-check a pending decision against a fresh quote at submission time.
/// If price has already moved through the pending level the order would
/// either fill instantly or be rejected, so it is downgraded to a market
/// entry at the current working price.
pub fn revalidate_pending(
    decision: EntryDecision,
    direction: Direction,
    quote: Option<&Quote>,
) -> EntryDecision {
    let (quote, level) = match (quote, decision.price) {
        (Some(q), Some(p)) if decision.is_pending() => (q, p),
        _ => return decision,
    };

    let moved_through = match (direction, decision.kind) {
        (Direction::Long, EntryKind::Stop) => quote.ask >= level,
        (Direction::Long, EntryKind::Limit) => quote.ask <= level,
        (Direction::Short, EntryKind::Stop) => quote.bid <= level,
        (Direction::Short, EntryKind::Limit) => quote.bid >= level,
        (_, EntryKind::Market) => false,
    };

    if moved_through {
        EntryDecision::market(Some(quote.side_price(direction)))
    } else {
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(bid: f64, ask: f64) -> Quote {
        Quote { bid, ask }
    }

    #[test]
    fn no_quote_falls_back_to_market() {
        let d = resolve_entry(Direction::Long, 100.0, 102.0, None, 0.0);
        assert_eq!(d, EntryDecision::market(None));
    }

    #[test]
    fn long_band_above_ask_is_stop() {
        let q = quote(99.0, 99.5);
        let d = resolve_entry(Direction::Long, 100.0, 102.0, Some(&q), 0.0);
        assert_eq!(d, EntryDecision::stop(100.0));
    }

    #[test]
    fn long_band_below_ask_is_limit() {
        let q = quote(104.5, 105.0);
        let d = resolve_entry(Direction::Long, 100.0, 102.0, Some(&q), 0.0);
        assert_eq!(d, EntryDecision::limit(102.0));
    }

    #[test]
    fn long_ask_inside_band_is_market() {
        let q = quote(100.5, 101.0);
        let d = resolve_entry(Direction::Long, 100.0, 102.0, Some(&q), 0.0);
        assert_eq!(d, EntryDecision::market(Some(101.0)));
    }

    #[test]
    fn short_band_below_bid_is_stop() {
        let q = quote(105.0, 105.5);
        let d = resolve_entry(Direction::Short, 100.0, 102.0, Some(&q), 0.0);
        assert_eq!(d, EntryDecision::stop(102.0));
    }

    #[test]
    fn short_band_above_bid_is_limit() {
        let q = quote(99.0, 99.5);
        let d = resolve_entry(Direction::Short, 100.0, 102.0, Some(&q), 0.0);
        assert_eq!(d, EntryDecision::limit(100.0));
    }

    #[test]
    fn short_bid_inside_band_is_market() {
        let q = quote(101.0, 101.5);
        let d = resolve_entry(Direction::Short, 100.0, 102.0, Some(&q), 0.0);
        assert_eq!(d, EntryDecision::market(Some(101.0)));
    }

    #[test]
    fn tolerance_keeps_near_band_at_market() {
        // Band edge only 0.3 above the ask: inside tolerance, stay market.
        let q = quote(99.2, 99.7);
        let d = resolve_entry(Direction::Long, 100.0, 102.0, Some(&q), 0.5);
        assert_eq!(d, EntryDecision::market(Some(99.7)));

        let d = resolve_entry(Direction::Long, 100.0, 102.0, Some(&q), 0.1);
        assert_eq!(d, EntryDecision::stop(100.0));
    }

    #[test]
    fn revalidation_downgrades_stop_after_move_through() {
        let stale = EntryDecision::stop(100.0);
        let fresh = quote(100.4, 100.9);
        let d = revalidate_pending(stale, Direction::Long, Some(&fresh));
        assert_eq!(d, EntryDecision::market(Some(100.9)));
    }

    #[test]
    fn revalidation_keeps_untouched_pending() {
        let stale = EntryDecision::stop(100.0);
        let fresh = quote(99.0, 99.5);
        let d = revalidate_pending(stale.clone(), Direction::Long, Some(&fresh));
        assert_eq!(d, stale);
    }

    #[test]
    fn revalidation_without_quote_is_noop() {
        let stale = EntryDecision::limit(102.0);
        let d = revalidate_pending(stale.clone(), Direction::Long, None);
        assert_eq!(d, stale);
    }
}
