//! JSON-RPC chain client over an ethers HTTP provider

use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use ethers::utils::id;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::time::sleep;

use crate::domain::chain::ChainClient;
use crate::shared::errors::ChainError;
use crate::shared::types::{TokenInfo, TxHandle};
use crate::shared::utils::wei_to_ether;

const MAX_CONFIRMATION_POLLS: u32 = 120;

pub struct EvmChainClient {
    provider: Provider<Http>,
    chain_id: u64,
}

impl EvmChainClient {
    /// One client per target chain; the RPC endpoint is drawn at random
    /// from the configured pool.
    pub fn new(rpc_urls: &[String], chain_id: u64) -> Result<Self, ChainError> {
        let url = {
            let mut rng = rand::thread_rng();
            rpc_urls
                .choose(&mut rng)
                .ok_or_else(|| ChainError::Rpc("no RPC endpoints configured".to_string()))?
                .clone()
        };
        let provider = Provider::<Http>::try_from(url.as_str())
            .map_err(|e| ChainError::Rpc(format!("bad RPC url {}: {}", url, e)))?;
        Ok(Self { provider, chain_id })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

fn classify(err: ProviderError) -> ChainError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("429")
        || lowered.contains("rate limit")
        || lowered.contains("too many requests")
    {
        ChainError::RateLimited(message)
    } else {
        ChainError::Rpc(message)
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    async fn balance(&self, address: Address) -> Result<f64, ChainError> {
        Ok(wei_to_ether(self.balance_wei(address).await?))
    }

    async fn balance_wei(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(classify)
    }

    async fn is_deployed(&self, address: Address) -> Result<bool, ChainError> {
        let code = self
            .provider
            .get_code(address, None)
            .await
            .map_err(classify)?;
        Ok(!code.is_empty())
    }

    async fn token_balance(&self, token: &TokenInfo, owner: Address) -> Result<U256, ChainError> {
        let mut data = id("balanceOf(address)").to_vec();
        data.extend(abi::encode(&[Token::Address(owner)]));
        let output = self.call(token.address, data.into()).await?;
        if output.len() < 32 {
            return Err(ChainError::Rpc(format!(
                "short balanceOf response for {}",
                token.symbol
            )));
        }
        Ok(U256::from_big_endian(&output[..32]))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.provider.call(&tx, None).await.map_err(classify)
    }

    async fn submit(
        &self,
        wallet: &LocalWallet,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<TxHandle, ChainError> {
        let wallet = wallet.clone().with_chain_id(self.chain_id);
        let from = wallet.address();
        let nonce = self
            .provider
            .get_transaction_count(from, None)
            .await
            .map_err(classify)?;
        let gas_price = self.provider.get_gas_price().await.map_err(classify)?;

        let mut tx: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .data(data)
            .nonce(nonce)
            .gas_price(gas_price)
            .chain_id(self.chain_id)
            .into();

        let estimate = self
            .provider
            .estimate_gas(&tx, None)
            .await
            .map_err(classify)?;
        // pad the estimate and jitter it so gas usage doesn't fingerprint
        let padded = {
            let mut rng = rand::thread_rng();
            estimate * U256::from(125) / U256::from(100) + U256::from(rng.gen_range(1..=1000u64))
        };
        tx.set_gas(padded);

        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(classify)?;
        // PendingTransaction derefs to the submitted hash
        Ok(TxHandle::new(*pending))
    }

    async fn wait_for_confirmation(
        &self,
        tx: &TxHandle,
        poll_interval: Duration,
    ) -> Result<(), ChainError> {
        for _ in 0..MAX_CONFIRMATION_POLLS {
            let receipt = self
                .provider
                .get_transaction_receipt(tx.hash)
                .await
                .map_err(classify)?;
            if let Some(receipt) = receipt {
                if receipt.status.map(|status| status.as_u64()) == Some(1) {
                    return Ok(());
                }
                return Err(ChainError::Reverted(tx.hash));
            }
            sleep(poll_interval).await;
        }
        Err(ChainError::ConfirmationTimeout(tx.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_errors_classify_as_transient() {
        let err = classify(ProviderError::CustomError(
            "HTTP 429 Too Many Requests".to_string(),
        ));
        assert!(err.is_transient());

        let err = classify(ProviderError::CustomError("connection refused".to_string()));
        assert!(!err.is_transient());
    }

    #[test]
    fn client_requires_at_least_one_endpoint() {
        assert!(EvmChainClient::new(&[], 1).is_err());
        let client =
            EvmChainClient::new(&["https://rpc.example".to_string()], 324).unwrap();
        assert_eq!(client.chain_id(), 324);
    }

    #[test]
    fn balance_of_calldata_is_selector_plus_padded_owner() {
        let owner: Address = "0x8ba1f109551bD432803012645Ac136ddd64DBA72"
            .parse()
            .unwrap();
        let mut data = id("balanceOf(address)").to_vec();
        data.extend(abi::encode(&[Token::Address(owner)]));
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(&data[16..36], owner.as_bytes());
    }
}
