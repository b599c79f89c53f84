pub mod executor;

pub use executor::TradeExecutor;
