use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::handle::TradeHandle;
use crate::models::{Direction, EntryKind, OutcomeStatus, Signal};

/// How a signal would be entered, decided once against the quote at decision
/// time and never recomputed afterwards. `price` is `None` only for a market
/// entry taken without a quote (best-effort fill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDecision {
    pub kind: EntryKind,
    pub price: Option<f64>,
}

impl EntryDecision {
    pub fn market(price: Option<f64>) -> Self {
        Self {
            kind: EntryKind::Market,
            price,
        }
    }

    pub fn stop(price: f64) -> Self {
        Self {
            kind: EntryKind::Stop,
            price: Some(price),
        }
    }

    pub fn limit(price: f64) -> Self {
        Self {
            kind: EntryKind::Limit,
            price: Some(price),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.kind.is_pending()
    }
}

/// Terminal result of one signal evaluation or one monitored trade.
/// Built exactly once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub hit_time: Option<DateTime<Utc>>,
    pub entry: EntryDecision,
    pub note: String,
    /// Realized profit, live path only.
    pub profit: Option<f64>,
}

impl Outcome {
    pub fn resolved(
        status: OutcomeStatus,
        hit_time: DateTime<Utc>,
        entry: EntryDecision,
        note: impl Into<String>,
    ) -> Self {
        Self {
            status,
            hit_time: Some(hit_time),
            entry,
            note: note.into(),
            profit: None,
        }
    }

    pub fn unresolved(entry: EntryDecision, note: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::None_,
            hit_time: None,
            entry,
            note: note.into(),
            profit: None,
        }
    }
}

/// Poll-step result for a live trade: either the position is still running
/// or it resolved into a final outcome. Replaces ad-hoc "maybe a result"
/// maps with one closed type.
#[derive(Debug, Clone)]
pub enum Resolution {
    Pending,
    Resolved(Outcome),
}

/// Flat row handed to persistence and reporting. One row per resolved
/// signal or trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRow {
    pub message_id: i64,
    pub symbol: String,
    pub direction: Direction,
    pub entry_type: EntryKind,
    pub entry_price: Option<f64>,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub market_price_at_signal: Option<f64>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: OutcomeStatus,
    pub profit: Option<f64>,
    pub note: String,
}

impl OutcomeRow {
    pub fn from_evaluation(signal: &Signal, outcome: &Outcome) -> Self {
        Self {
            message_id: signal.message_id,
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            entry_type: outcome.entry.kind,
            entry_price: outcome.entry.price,
            take_profit: signal.take_profit,
            stop_loss: signal.stop_loss,
            market_price_at_signal: None,
            opened_at: Some(signal.created_at),
            closed_at: outcome.hit_time,
            status: outcome.status,
            profit: outcome.profit,
            note: outcome.note.clone(),
        }
    }

    pub fn from_trade(handle: &TradeHandle, outcome: &Outcome) -> Self {
        Self {
            message_id: handle.signal.message_id,
            symbol: handle.signal.symbol.clone(),
            direction: handle.signal.direction,
            entry_type: outcome.entry.kind,
            entry_price: Some(handle.executed_price),
            take_profit: handle.signal.take_profit,
            stop_loss: handle.signal.stop_loss,
            market_price_at_signal: handle.market_price_at_signal,
            opened_at: Some(handle.opened_at),
            closed_at: outcome.hit_time,
            status: outcome.status,
            profit: outcome.profit,
            note: outcome.note.clone(),
        }
    }
}
