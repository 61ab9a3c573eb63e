//! Price and gas oracle ports

use async_trait::async_trait;

use crate::shared::errors::OracleError;

/// Current USD price of a symbol
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn price_usd(&self, symbol: &str) -> Result<f64, OracleError>;
}

/// Current recommended network gas price
#[async_trait]
pub trait GasOracle: Send + Sync {
    async fn gas_price_gwei(&self) -> Result<f64, OracleError>;
}
