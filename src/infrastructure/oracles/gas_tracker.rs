//! Recommended gas price via the Etherscan gas tracker

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::oracles::GasOracle;
use crate::shared::errors::OracleError;

const DEFAULT_URL: &str = "https://api.etherscan.io/api?module=gastracker&action=gasoracle";

#[derive(Debug, Deserialize)]
struct GasTrackerResponse {
    result: GasTrackerResult,
}

#[derive(Debug, Deserialize)]
struct GasTrackerResult {
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: String,
}

pub struct GasTrackerOracle {
    http: reqwest::Client,
    url: String,
}

impl GasTrackerOracle {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_URL.to_string())
    }

    pub fn with_url(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

impl Default for GasTrackerOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GasOracle for GasTrackerOracle {
    async fn gas_price_gwei(&self) -> Result<f64, OracleError> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(OracleError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: GasTrackerResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        body.result
            .safe_gas_price
            .parse::<f64>()
            .map_err(|e| OracleError::InvalidResponse(format!("bad SafeGasPrice field: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_tracker_response_parses() {
        let body: GasTrackerResponse = serde_json::from_str(
            r#"{"status":"1","message":"OK","result":{"LastBlock":"18000000","SafeGasPrice":"21","ProposeGasPrice":"22","FastGasPrice":"24"}}"#,
        )
        .unwrap();
        assert_eq!(body.result.safe_gas_price.parse::<f64>().unwrap(), 21.0);
    }
}
