use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Direction;

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    #[error("entry band inverted: low {low} > high {high}")]
    InvertedBand { low: f64, high: f64 },
    #[error("{direction} signal with tp {tp} not beyond sl {sl}")]
    TargetsContradictDirection {
        direction: Direction,
        tp: f64,
        sl: f64,
    },
}

/// A parsed trading signal. Immutable once constructed; evaluation never
/// writes back into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub message_id: i64,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub direction: Direction,
    pub entry_low: f64,
    pub entry_high: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    /// Set when one message carries several take-profit targets sharing the
    /// same entry band and stop.
    #[serde(default)]
    pub tp_index: Option<u32>,
}

impl Signal {
    /// Reject malformed signals before any evaluation starts. An inverted
    /// band or a TP/SL pair that contradicts the direction is a caller bug,
    /// not a market condition.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.entry_low > self.entry_high {
            return Err(SignalError::InvertedBand {
                low: self.entry_low,
                high: self.entry_high,
            });
        }

        let consistent = match self.direction {
            Direction::Long => self.take_profit > self.stop_loss,
            Direction::Short => self.take_profit < self.stop_loss,
        };
        if !consistent {
            return Err(SignalError::TargetsContradictDirection {
                direction: self.direction,
                tp: self.take_profit,
                sl: self.stop_loss,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_signal;

    #[test]
    fn valid_long_passes() {
        let sig = make_signal(Direction::Long, 100.0, 102.0, 110.0, 95.0);
        assert!(sig.validate().is_ok());
    }

    #[test]
    fn valid_short_passes() {
        let sig = make_signal(Direction::Short, 100.0, 102.0, 90.0, 105.0);
        assert!(sig.validate().is_ok());
    }

    #[test]
    fn inverted_band_rejected() {
        let sig = make_signal(Direction::Long, 102.0, 100.0, 110.0, 95.0);
        assert_eq!(
            sig.validate(),
            Err(SignalError::InvertedBand {
                low: 102.0,
                high: 100.0
            })
        );
    }

    #[test]
    fn long_with_tp_below_sl_rejected() {
        let sig = make_signal(Direction::Long, 100.0, 102.0, 90.0, 95.0);
        assert!(matches!(
            sig.validate(),
            Err(SignalError::TargetsContradictDirection { .. })
        ));
    }

    #[test]
    fn short_with_tp_above_sl_rejected() {
        let sig = make_signal(Direction::Short, 100.0, 102.0, 110.0, 105.0);
        assert!(matches!(
            sig.validate(),
            Err(SignalError::TargetsContradictDirection { .. })
        ));
    }
}
