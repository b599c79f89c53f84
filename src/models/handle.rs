use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::outcome::EntryDecision;
use crate::models::Signal;

/// One live execution unit: a broker ticket bound to the signal that
/// produced it. Owned exclusively by the monitor task tracking it; dropped
/// once a terminal outcome has been recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeHandle {
    /// Position (filled) or pending-order ticket being tracked.
    pub ticket: u64,
    pub signal: Signal,
    /// Entry decision taken at placement time.
    pub entry: EntryDecision,
    /// Price the broker actually opened at.
    pub executed_price: f64,
    /// Market price observed when the signal arrived, kept for slippage
    /// analysis. `None` when no quote was available.
    pub market_price_at_signal: Option<f64>,
    pub opened_at: DateTime<Utc>,
    /// Other pending-order tickets placed for the same message. At most one
    /// of the group is expected to fill; the rest get cancelled after a TP.
    #[serde(default)]
    pub sibling_tickets: Vec<u64>,
}

impl TradeHandle {
    /// A parent handle stands alone; anything with siblings is part of a
    /// multi-order group.
    pub fn is_parent(&self) -> bool {
        self.sibling_tickets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use crate::test_helpers::{make_handle, make_signal};

    #[test]
    fn parent_has_no_siblings() {
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        let handle = make_handle(1001, sig, vec![]);
        assert!(handle.is_parent());
    }

    #[test]
    fn sibling_group_is_not_parent() {
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        let handle = make_handle(1001, sig, vec![1002, 1003]);
        assert!(!handle.is_parent());
    }
}
