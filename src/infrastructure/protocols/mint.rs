//! One-shot contract mints (NFT drops and similar public mints)

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, U256};
use ethers::utils::id;

use crate::domain::adapters::MintAdapter;
use crate::domain::chain::ChainClient;
use crate::shared::errors::ChainError;
use crate::shared::types::{Account, TxHandle};
use crate::shared::utils::ether_to_wei;

/// Calls a fixed mint entrypoint on a configured contract. The function
/// is either nullary (`mint()`) or takes the recipient
/// (`publicMint(address)`).
pub struct OpenMintAdapter {
    name: String,
    chain: Arc<dyn ChainClient>,
    contract: Address,
    function: String,
    mint_fee_wei: U256,
}

impl OpenMintAdapter {
    pub fn new(
        name: String,
        chain: Arc<dyn ChainClient>,
        contract: Address,
        function: String,
        mint_fee: f64,
    ) -> Result<Self, ChainError> {
        if !function.ends_with("()") && !function.ends_with("(address)") {
            return Err(ChainError::BadKey(format!(
                "unsupported mint function signature: {}",
                function
            )));
        }
        Ok(Self {
            name,
            chain,
            contract,
            function,
            mint_fee_wei: ether_to_wei(mint_fee),
        })
    }
}

#[async_trait]
impl MintAdapter for OpenMintAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn mint(&self, account: &Account) -> Result<TxHandle, ChainError> {
        let mut data = id(&self.function).to_vec();
        if self.function.ends_with("(address)") {
            data.extend(abi::encode(&[Token::Address(account.address)]));
        }
        self.chain
            .submit(&account.wallet, self.contract, self.mint_fee_wei, data.into())
            .await
    }
}
