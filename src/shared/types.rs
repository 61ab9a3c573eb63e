//! Common types used across the application

use ethers::signers::LocalWallet;
use ethers::types::{Address, H256};
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};

use crate::shared::errors::ChainError;

/// One wallet under management: an L2 account plus an optional L1 key
/// for bridge deposits. Immutable during a run.
#[derive(Debug, Clone)]
pub struct Account {
    /// L2 account address (unique within a run)
    pub address: Address,
    /// Opaque L2 signer binding
    pub wallet: LocalWallet,
    /// Hex private key for the L1 side, if the wallet has one
    pub l1_private_key: Option<String>,
}

impl Account {
    pub fn new(address: Address, wallet: LocalWallet, l1_private_key: Option<String>) -> Self {
        Self {
            address,
            wallet,
            l1_private_key,
        }
    }

    /// Short printable form of the address for log lines
    pub fn short_address(&self) -> String {
        to_checksum(&self.address, None)
    }

    pub fn l1_wallet(&self) -> Result<Option<LocalWallet>, ChainError> {
        self.l1_private_key
            .as_deref()
            .map(|key| {
                key.trim_start_matches("0x")
                    .parse::<LocalWallet>()
                    .map_err(|e| ChainError::BadKey(format!("L1 key for {}: {}", self.short_address(), e)))
            })
            .transpose()
    }
}

/// ERC-20 token known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    /// Stablecoins are valued at face value instead of an oracle lookup
    #[serde(default)]
    pub stable: bool,
}

/// Handle of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: H256,
}

impl TxHandle {
    pub fn new(hash: H256) -> Self {
        Self { hash }
    }
}

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.hash)
    }
}

/// Action category reported to the accounting service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Swap,
    Bridge,
    Nft,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Swap => "swap",
            ActionKind::Bridge => "bridge",
            ActionKind::Nft => "nft",
        }
    }
}

/// Account identity sent to the accounting service: the same address in
/// its two canonical renderings, hashed client-side before transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub checksummed: String,
    pub lowercase: String,
}

impl AccountIdentity {
    pub fn from_address(address: Address) -> Self {
        Self {
            checksummed: to_checksum(&address, None),
            lowercase: format!("{:?}", address),
        }
    }
}

/// Ticket granted by the accounting service for one authorized action.
/// Refundable at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationTicket {
    pub cancel_id: i64,
    pub whitelisted: bool,
    pub new_balance: i64,
}

/// Accounting service user record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user: String,
    pub balance: i64,
}

/// How a project's amount is drawn
#[derive(Debug, Clone, PartialEq)]
pub enum AmountSpec {
    /// USD range, converted to native units at the current price
    Usd(f64, f64),
    /// Native-unit range, used as-is
    Native(f64, f64),
    /// Percent-of-available-balance range
    Percent(u32, u32),
}

/// Project categories the planner buckets by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectKind {
    Swap,
    Mint,
    BridgeDeposit,
    BridgeWithdraw,
    Consolidation,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_wallet() -> LocalWallet {
        "0000000000000000000000000000000000000000000000000000000000000001"
            .parse()
            .unwrap()
    }

    #[test]
    fn identity_renders_both_forms() {
        let address: Address = "0x8ba1f109551bD432803012645Ac136ddd64DBA72"
            .parse()
            .unwrap();
        let identity = AccountIdentity::from_address(address);
        assert_eq!(identity.checksummed, "0x8ba1f109551bD432803012645Ac136ddd64DBA72");
        assert_eq!(identity.lowercase, "0x8ba1f109551bd432803012645ac136ddd64dba72");
    }

    #[test]
    fn l1_wallet_accepts_prefixed_keys() {
        let account = Account::new(
            Address::zero(),
            test_wallet(),
            Some("0x0000000000000000000000000000000000000000000000000000000000000002".to_string()),
        );
        assert!(account.l1_wallet().unwrap().is_some());

        let account = Account::new(Address::zero(), test_wallet(), None);
        assert!(account.l1_wallet().unwrap().is_none());
    }

    #[test]
    fn bad_l1_key_is_an_error() {
        let account = Account::new(Address::zero(), test_wallet(), Some("not-a-key".to_string()));
        assert!(account.l1_wallet().is_err());
    }
}
