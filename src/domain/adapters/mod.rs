//! Operation adapter ports - one thin calldata encoder per protocol

use async_trait::async_trait;
use ethers::types::U256;

use crate::shared::errors::ChainError;
use crate::shared::types::{Account, TokenInfo, TxHandle};

/// DEX swap between the base asset and a token. Implementations must
/// surface rate-limit conditions as `ChainError::RateLimited` so the
/// engine can distinguish transient from permanent failures.
#[async_trait]
pub trait SwapAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Tokens this protocol can trade against the base asset
    fn supported_tokens(&self) -> &[TokenInfo];

    fn supports_token(&self, symbol: &str) -> bool {
        self.supported_tokens().iter().any(|t| t.symbol == symbol)
    }

    /// Base asset -> token
    async fn swap_to_token(
        &self,
        account: &Account,
        amount_native: f64,
        token: &TokenInfo,
        slippage_percent: f64,
    ) -> Result<TxHandle, ChainError>;

    /// Token -> base asset, amount in raw token units
    async fn swap_to_base(
        &self,
        account: &Account,
        token: &TokenInfo,
        amount_raw: U256,
        slippage_percent: f64,
    ) -> Result<TxHandle, ChainError>;
}

/// Cross-chain bridge. Deposits move funds from the L1 side (the
/// account's secondary key), withdrawals move a percentage of the L2
/// balance toward a destination network.
#[async_trait]
pub trait BridgeAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn deposit(
        &self,
        account: &Account,
        network: &str,
        amount_native: f64,
    ) -> Result<TxHandle, ChainError>;

    async fn withdraw(
        &self,
        account: &Account,
        network: &str,
        amount_percent: u32,
    ) -> Result<TxHandle, ChainError>;
}

/// Contract mint (NFT drops and similar one-shot calls)
#[async_trait]
pub trait MintAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn mint(&self, account: &Account) -> Result<TxHandle, ChainError>;
}
