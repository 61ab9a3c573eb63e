//! Blocking, cancellable wait for an acceptable network gas price

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::oracles::GasOracle;
use crate::domain::trader::ExecutionState;

const LOOKUP_RETRY_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Cleared,
    Stopped,
}

pub struct GasGate {
    oracle: Arc<dyn GasOracle>,
    state: Arc<ExecutionState>,
    ceiling_gwei: Option<f64>,
    poll_interval: Duration,
}

impl GasGate {
    pub fn new(
        oracle: Arc<dyn GasOracle>,
        state: Arc<ExecutionState>,
        ceiling_gwei: Option<f64>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            oracle,
            state,
            ceiling_gwei,
            poll_interval,
        }
    }

    /// Wait until the observed gas price drops below the configured
    /// ceiling. Lookup failures retry after a short fixed wait and do
    /// not consume the poll interval. Stop is honored at every
    /// iteration boundary.
    pub async fn wait_for_acceptable_gas(&self) -> GateOutcome {
        let ceiling = match self.ceiling_gwei {
            Some(value) if value > 0.0 => value,
            _ => return GateOutcome::Cleared,
        };

        loop {
            if !self.state.checkpoint().await {
                return GateOutcome::Stopped;
            }
            let price = match self.oracle.gas_price_gwei().await {
                Ok(price) => price,
                Err(err) => {
                    warn!("Gas price lookup failed: {}", err);
                    if !self
                        .state
                        .sleep_interruptible(Duration::from_secs(LOOKUP_RETRY_SECS))
                        .await
                    {
                        return GateOutcome::Stopped;
                    }
                    continue;
                }
            };
            if price < ceiling {
                debug!("Gas price {:.1} gwei is under the {:.1} gwei limit", price, ceiling);
                return GateOutcome::Cleared;
            }
            info!(
                "Gas price {:.1} gwei is above the {:.1} gwei limit, waiting...",
                price, ceiling
            );
            if !self.state.sleep_interruptible(self.poll_interval).await {
                return GateOutcome::Stopped;
            }
        }
    }
}
