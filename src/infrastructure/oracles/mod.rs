//! HTTP price and gas oracles

mod binance;
mod gas_tracker;

pub use binance::BinancePriceOracle;
pub use gas_tracker::GasTrackerOracle;
