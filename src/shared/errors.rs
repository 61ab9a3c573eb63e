//! Error handling for the application

use ethers::types::H256;
use thiserror::Error;

/// Accounting/authorization service errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0} code")]
    Http(u16),

    #[error("API request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed API response: {0}")]
    InvalidResponse(String),

    #[error("API hashes don't match")]
    HashMismatch,

    #[error("action rejected by the API: {0}")]
    Rejected(String),
}

/// Price/gas oracle errors
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("bad oracle response: {0}")]
    InvalidResponse(String),
}

/// Chain RPC and transaction errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("rate limited by the RPC node: {0}")]
    RateLimited(String),

    #[error("bad address or private key: {0}")]
    BadKey(String),

    #[error("failed to sign transaction: {0}")]
    Signing(String),

    #[error("transaction reverted: {0:?}")]
    Reverted(H256),

    #[error("transaction confirmation timeout: {0:?}")]
    ConfirmationTimeout(H256),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("amount out of bridge bounds: {0}")]
    OutOfBounds(String),

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),
}

impl ChainError {
    /// Transient errors are worth a bounded retry; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::RateLimited(_))
    }
}

/// Trading engine errors
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("insufficient balance: available {available:.6}, required at least {required:.6}")]
    InsufficientBalance { available: f64, required: f64 },

    #[error("account not deployed yet")]
    AccountUndeployed,

    #[error("no adapter supports token {0}")]
    NoAdapterForToken(String),

    #[error("price lookup failed: {0}")]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl TradeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TradeError::Chain(err) if err.is_transient())
    }
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("account loading error: {0}")]
    Accounts(String),

    #[error("trade error: {0}")]
    Trade(#[from] TradeError),
}
