//! Spot price lookup via the Binance public ticker API

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::oracles::PriceOracle;
use crate::shared::errors::OracleError;

const DEFAULT_BASE_URL: &str = "https://www.binance.com/api/v3";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}

pub struct BinancePriceOracle {
    http: reqwest::Client,
    base_url: String,
}

impl BinancePriceOracle {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }
}

impl Default for BinancePriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceOracle for BinancePriceOracle {
    async fn price_usd(&self, symbol: &str) -> Result<f64, OracleError> {
        let url = format!(
            "{}/ticker/price?symbol={}USDT",
            self.base_url,
            symbol.to_uppercase()
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(OracleError::InvalidResponse(format!(
                "HTTP {} for {}",
                response.status(),
                symbol
            )));
        }
        let ticker: TickerResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| OracleError::InvalidResponse(format!("bad price field: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_response_parses() {
        let ticker: TickerResponse =
            serde_json::from_str(r#"{"symbol":"ETHUSDT","price":"1843.25000000"}"#).unwrap();
        assert_eq!(ticker.price.parse::<f64>().unwrap(), 1843.25);
    }
}
