//! UniswapV2-style router swaps between the base asset and ERC-20 tokens

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;
use tracing::debug;

use crate::domain::adapters::SwapAdapter;
use crate::domain::chain::ChainClient;
use crate::shared::errors::ChainError;
use crate::shared::types::{Account, TokenInfo, TxHandle};
use crate::shared::utils::ether_to_wei;

const DEADLINE_SECS: i64 = 600;
const APPROVE_POLL_SECS: u64 = 5;

pub struct V2RouterSwapAdapter {
    name: String,
    chain: Arc<dyn ChainClient>,
    router: Address,
    weth: Address,
    tokens: Vec<TokenInfo>,
}

impl V2RouterSwapAdapter {
    pub fn new(
        name: String,
        chain: Arc<dyn ChainClient>,
        router: Address,
        weth: Address,
        tokens: Vec<TokenInfo>,
    ) -> Self {
        Self {
            name,
            chain,
            router,
            weth,
            tokens,
        }
    }

    async fn quote_out(&self, amount_in: U256, path: &[Address]) -> Result<U256, ChainError> {
        let data = encode_get_amounts_out(amount_in, path);
        let output = self.chain.call(self.router, data).await?;
        decode_amounts(&output)?
            .last()
            .copied()
            .ok_or_else(|| ChainError::Rpc("empty getAmountsOut response".to_string()))
    }

    async fn allowance(&self, owner: Address, token: Address) -> Result<U256, ChainError> {
        let mut data = id("allowance(address,address)").to_vec();
        data.extend(abi::encode(&[
            Token::Address(owner),
            Token::Address(self.router),
        ]));
        let output = self.chain.call(token, data.into()).await?;
        if output.len() < 32 {
            return Err(ChainError::Rpc("short allowance response".to_string()));
        }
        Ok(U256::from_big_endian(&output[..32]))
    }

    /// Top up the router allowance before selling a token and wait for
    /// the approval to land; the follow-up swap needs it mined.
    async fn ensure_allowance(
        &self,
        account: &Account,
        token: &TokenInfo,
        amount: U256,
    ) -> Result<(), ChainError> {
        let current = self.allowance(account.address, token.address).await?;
        if current >= amount {
            return Ok(());
        }
        let mut data = id("approve(address,uint256)").to_vec();
        data.extend(abi::encode(&[
            Token::Address(self.router),
            Token::Uint(amount),
        ]));
        let tx = self
            .chain
            .submit(&account.wallet, token.address, U256::zero(), data.into())
            .await?;
        debug!(
            "Allowed {} raw {} to trade on {}, tx {}",
            amount, token.symbol, self.name, tx
        );
        self.chain
            .wait_for_confirmation(&tx, Duration::from_secs(APPROVE_POLL_SECS))
            .await
    }

    fn deadline() -> U256 {
        U256::from((Utc::now().timestamp() + DEADLINE_SECS) as u64)
    }
}

fn encode_get_amounts_out(amount_in: U256, path: &[Address]) -> Bytes {
    let mut data = id("getAmountsOut(uint256,address[])").to_vec();
    data.extend(abi::encode(&[
        Token::Uint(amount_in),
        Token::Array(path.iter().map(|a| Token::Address(*a)).collect()),
    ]));
    data.into()
}

fn decode_amounts(output: &[u8]) -> Result<Vec<U256>, ChainError> {
    let tokens = abi::decode(
        &[ParamType::Array(Box::new(ParamType::Uint(256)))],
        output,
    )
    .map_err(|e| ChainError::Rpc(format!("bad getAmountsOut response: {}", e)))?;
    match tokens.into_iter().next() {
        Some(Token::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Token::Uint(value) => Ok(value),
                other => Err(ChainError::Rpc(format!(
                    "unexpected amount token: {:?}",
                    other
                ))),
            })
            .collect(),
        _ => Err(ChainError::Rpc("bad getAmountsOut response".to_string())),
    }
}

/// Slippage is configured in percent; calldata wants an absolute floor
fn min_amount_out(quoted: U256, slippage_percent: f64) -> U256 {
    let slippage_bps = (slippage_percent * 100.0).round() as u64;
    quoted * U256::from(10_000 - slippage_bps.min(10_000)) / U256::from(10_000)
}

fn encode_swap_eth_for_tokens(
    min_out: U256,
    path: &[Address],
    recipient: Address,
    deadline: U256,
) -> Bytes {
    let mut data = id("swapExactETHForTokens(uint256,address[],address,uint256)").to_vec();
    data.extend(abi::encode(&[
        Token::Uint(min_out),
        Token::Array(path.iter().map(|a| Token::Address(*a)).collect()),
        Token::Address(recipient),
        Token::Uint(deadline),
    ]));
    data.into()
}

fn encode_swap_tokens_for_eth(
    amount_in: U256,
    min_out: U256,
    path: &[Address],
    recipient: Address,
    deadline: U256,
) -> Bytes {
    let mut data = id("swapExactTokensForETH(uint256,uint256,address[],address,uint256)").to_vec();
    data.extend(abi::encode(&[
        Token::Uint(amount_in),
        Token::Uint(min_out),
        Token::Array(path.iter().map(|a| Token::Address(*a)).collect()),
        Token::Address(recipient),
        Token::Uint(deadline),
    ]));
    data.into()
}

#[async_trait]
impl SwapAdapter for V2RouterSwapAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    async fn swap_to_token(
        &self,
        account: &Account,
        amount_native: f64,
        token: &TokenInfo,
        slippage_percent: f64,
    ) -> Result<TxHandle, ChainError> {
        let amount_in = ether_to_wei(amount_native);
        let path = [self.weth, token.address];
        let quoted = self.quote_out(amount_in, &path).await?;
        let min_out = min_amount_out(quoted, slippage_percent);
        let data = encode_swap_eth_for_tokens(min_out, &path, account.address, Self::deadline());
        self.chain
            .submit(&account.wallet, self.router, amount_in, data)
            .await
    }

    async fn swap_to_base(
        &self,
        account: &Account,
        token: &TokenInfo,
        amount_raw: U256,
        slippage_percent: f64,
    ) -> Result<TxHandle, ChainError> {
        self.ensure_allowance(account, token, amount_raw).await?;
        let path = [token.address, self.weth];
        let quoted = self.quote_out(amount_raw, &path).await?;
        let min_out = min_amount_out(quoted, slippage_percent);
        let data = encode_swap_tokens_for_eth(
            amount_raw,
            min_out,
            &path,
            account.address,
            Self::deadline(),
        );
        self.chain
            .submit(&account.wallet, self.router, U256::zero(), data)
            .await
    }
}
