//! Chain client port - balance, deployment, submission, confirmation

use std::time::Duration;

use async_trait::async_trait;
use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, U256};

use crate::shared::errors::ChainError;
use crate::shared::types::{TokenInfo, TxHandle};

/// Narrow contract against one chain's RPC surface. One instance per
/// target chain; all implementations must be usable from a single
/// sequential worker task.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance in whole units
    async fn balance(&self, address: Address) -> Result<f64, ChainError>;

    /// Native balance in wei
    async fn balance_wei(&self, address: Address) -> Result<U256, ChainError>;

    /// Whether the account contract has been deployed (non-empty code)
    async fn is_deployed(&self, address: Address) -> Result<bool, ChainError>;

    /// Raw ERC-20 balance of `owner`
    async fn token_balance(&self, token: &TokenInfo, owner: Address) -> Result<U256, ChainError>;

    /// Read-only contract call
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    /// Fill fees and nonce, sign with `wallet`, broadcast
    async fn submit(
        &self,
        wallet: &LocalWallet,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<TxHandle, ChainError>;

    /// Poll until the transaction is mined; reverted status is an error
    async fn wait_for_confirmation(
        &self,
        tx: &TxHandle,
        poll_interval: Duration,
    ) -> Result<(), ChainError>;
}
