pub mod entry;
pub mod evaluator;
pub mod tie_break;
pub mod walker;

pub use entry::{resolve_entry, revalidate_pending};
pub use evaluator::Evaluator;
pub use tie_break::resolve_tie;
pub use walker::{walk_bars, BarScan};
