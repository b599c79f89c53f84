pub mod bar;
pub mod direction;
pub mod handle;
pub mod outcome;
pub mod signal;
pub mod timeframe;

pub use bar::{Bar, BarSeries, Tick};
pub use direction::{Direction, EntryKind, OutcomeStatus};
pub use handle::TradeHandle;
pub use outcome::{EntryDecision, Outcome, OutcomeRow, Resolution};
pub use signal::{Signal, SignalError};
pub use timeframe::Timeframe;
