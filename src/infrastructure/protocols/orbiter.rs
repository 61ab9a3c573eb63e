//! Maker-transfer bridge: plain value transfers to a market maker
//! address, with the destination network encoded in the amount's last
//! four digits (9000 + network id).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::signers::Signer;
use ethers::types::{Address, Bytes, U256};
use tracing::debug;

use crate::domain::adapters::BridgeAdapter;
use crate::domain::chain::ChainClient;
use crate::shared::errors::ChainError;
use crate::shared::types::{Account, TxHandle};
use crate::shared::utils::{ether_to_wei, wei_to_ether};

/// Amounts are floored to this granularity so the identification tail
/// survives intact in the transferred value
const TAIL_MODULUS: u64 = 10_000;

pub struct OrbiterBridgeAdapter {
    name: String,
    l1_chain: Arc<dyn ChainClient>,
    l2_chain: Arc<dyn ChainClient>,
    maker: Address,
    trading_fee_wei: U256,
    min_amount_wei: U256,
    max_amount_wei: U256,
    networks: HashMap<String, u32>,
}

impl OrbiterBridgeAdapter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        l1_chain: Arc<dyn ChainClient>,
        l2_chain: Arc<dyn ChainClient>,
        maker: Address,
        trading_fee: f64,
        min_amount: f64,
        max_amount: f64,
        networks: HashMap<String, u32>,
    ) -> Self {
        Self {
            name,
            l1_chain,
            l2_chain,
            maker,
            trading_fee_wei: ether_to_wei(trading_fee),
            min_amount_wei: ether_to_wei(min_amount),
            max_amount_wei: ether_to_wei(max_amount),
            networks,
        }
    }

    fn tail(&self, network: &str) -> Result<U256, ChainError> {
        let internal_id = self
            .networks
            .get(network)
            .copied()
            .ok_or_else(|| ChainError::UnsupportedNetwork(network.to_string()))?;
        Ok(U256::from(9000 + internal_id as u64))
    }

    fn check_bounds(&self, amount_wei: U256) -> Result<(), ChainError> {
        if amount_wei < self.min_amount_wei {
            return Err(ChainError::OutOfBounds(format!(
                "minimum amount to bridge is {:.6} ETH",
                wei_to_ether(self.min_amount_wei)
            )));
        }
        if amount_wei > self.max_amount_wei {
            return Err(ChainError::OutOfBounds(format!(
                "maximum amount to bridge is {:.6} ETH",
                wei_to_ether(self.max_amount_wei)
            )));
        }
        Ok(())
    }

    /// Floor the amount to the tail granularity and append the fee and
    /// the identification digits. The trading fee must itself be a
    /// multiple of the granularity or the tail would be corrupted.
    fn seal(&self, amount_wei: U256, tail: U256) -> Result<U256, ChainError> {
        let modulus = U256::from(TAIL_MODULUS);
        let floored = amount_wei / modulus * modulus;
        let total = floored + self.trading_fee_wei + tail;
        if total % modulus != tail {
            return Err(ChainError::OutOfBounds(format!(
                "wrong end of the amount: {}",
                total
            )));
        }
        Ok(total)
    }
}

#[async_trait]
impl BridgeAdapter for OrbiterBridgeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deposit(
        &self,
        account: &Account,
        network: &str,
        amount_native: f64,
    ) -> Result<TxHandle, ChainError> {
        let wallet = account
            .l1_wallet()?
            .ok_or_else(|| ChainError::BadKey("account has no L1 key".to_string()))?;
        let tail = self.tail(network)?;
        let amount_wei = ether_to_wei(amount_native);
        self.check_bounds(amount_wei)?;
        let total = self.seal(amount_wei, tail)?;

        let balance = self.l1_chain.balance_wei(wallet.address()).await?;
        if balance < total {
            return Err(ChainError::InsufficientFunds(format!(
                "balance {:.6} ETH, transfer needs {:.6} ETH",
                wei_to_ether(balance),
                wei_to_ether(total)
            )));
        }
        debug!(
            "{}: sending {:.6} ETH to maker for network {}",
            self.name,
            wei_to_ether(total),
            network
        );
        self.l1_chain
            .submit(&wallet, self.maker, total, Bytes::new())
            .await
    }

    async fn withdraw(
        &self,
        account: &Account,
        network: &str,
        amount_percent: u32,
    ) -> Result<TxHandle, ChainError> {
        if amount_percent == 0 || amount_percent > 100 {
            return Err(ChainError::OutOfBounds(
                "amount percent must be from 1 to 100".to_string(),
            ));
        }
        let tail = self.tail(network)?;
        let balance = self.l2_chain.balance_wei(account.address).await?;
        let share = balance * U256::from(amount_percent) / U256::from(100);
        if share <= self.trading_fee_wei {
            return Err(ChainError::InsufficientFunds(
                "calculated amount does not cover the trading fee".to_string(),
            ));
        }
        let amount_wei = share - self.trading_fee_wei;
        self.check_bounds(amount_wei)?;
        let mut total = self.seal(amount_wei, tail)?;
        // leave headroom for gas when moving nearly the whole balance
        if total > balance {
            total = total - U256::from(TAIL_MODULUS);
        }
        if total > balance {
            return Err(ChainError::InsufficientFunds(format!(
                "balance {:.6} ETH, transfer needs {:.6} ETH",
                wei_to_ether(balance),
                wei_to_ether(total)
            )));
        }
        debug!(
            "{}: sending {:.6} ETH to maker for network {}",
            self.name,
            wei_to_ether(total),
            network
        );
        self.l2_chain
            .submit(&account.wallet, self.maker, total, Bytes::new())
            .await
    }
}
