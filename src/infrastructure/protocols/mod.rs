//! Thin protocol adapters and their config-driven factory

mod mint;
mod orbiter;
mod v2_router;

pub use mint::OpenMintAdapter;
pub use orbiter::OrbiterBridgeAdapter;
pub use v2_router::V2RouterSwapAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ethers::types::Address;

use crate::config::{AdapterCfg, AdapterKind};
use crate::domain::adapters::{BridgeAdapter, MintAdapter, SwapAdapter};
use crate::domain::chain::ChainClient;
use crate::shared::types::TokenInfo;

/// All configured protocol adapters, keyed by name
pub struct AdapterRegistry {
    swaps: HashMap<String, Arc<dyn SwapAdapter>>,
    bridges: HashMap<String, Arc<dyn BridgeAdapter>>,
    mints: HashMap<String, Arc<dyn MintAdapter>>,
}

fn parse_address(value: &Option<String>, what: &str, adapter: &str) -> Result<Address> {
    value
        .as_deref()
        .with_context(|| format!("adapter {} is missing {}", adapter, what))?
        .parse()
        .with_context(|| format!("adapter {} has a bad {} address", adapter, what))
}

impl AdapterRegistry {
    pub fn build(
        configs: &[AdapterCfg],
        tokens: &[TokenInfo],
        l1_chain: Arc<dyn ChainClient>,
        l2_chain: Arc<dyn ChainClient>,
    ) -> Result<Self> {
        let mut registry = Self {
            swaps: HashMap::new(),
            bridges: HashMap::new(),
            mints: HashMap::new(),
        };

        for config in configs {
            match config.kind {
                AdapterKind::V2Router => {
                    let supported: Vec<TokenInfo> = config
                        .tokens
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .map(|symbol| {
                            tokens
                                .iter()
                                .find(|t| &t.symbol == symbol)
                                .cloned()
                                .with_context(|| {
                                    format!(
                                        "adapter {} references unknown token {}",
                                        config.name, symbol
                                    )
                                })
                        })
                        .collect::<Result<_>>()?;
                    let adapter = V2RouterSwapAdapter::new(
                        config.name.clone(),
                        l2_chain.clone(),
                        parse_address(&config.router, "router", &config.name)?,
                        parse_address(&config.weth, "weth", &config.name)?,
                        supported,
                    );
                    registry
                        .swaps
                        .insert(config.name.clone(), Arc::new(adapter));
                }
                AdapterKind::Orbiter => {
                    let adapter = OrbiterBridgeAdapter::new(
                        config.name.clone(),
                        l1_chain.clone(),
                        l2_chain.clone(),
                        parse_address(&config.maker, "maker", &config.name)?,
                        config
                            .trading_fee
                            .with_context(|| format!("adapter {} needs trading_fee", config.name))?,
                        config
                            .min_amount
                            .with_context(|| format!("adapter {} needs min_amount", config.name))?,
                        config
                            .max_amount
                            .with_context(|| format!("adapter {} needs max_amount", config.name))?,
                        config.networks.clone().unwrap_or_default(),
                    );
                    registry
                        .bridges
                        .insert(config.name.clone(), Arc::new(adapter));
                }
                AdapterKind::Mint => {
                    let adapter = OpenMintAdapter::new(
                        config.name.clone(),
                        l2_chain.clone(),
                        parse_address(&config.contract, "contract", &config.name)?,
                        config
                            .function
                            .clone()
                            .with_context(|| format!("adapter {} needs function", config.name))?,
                        config.mint_fee,
                    )
                    .with_context(|| format!("adapter {} rejected", config.name))?;
                    registry
                        .mints
                        .insert(config.name.clone(), Arc::new(adapter));
                }
            }
        }
        Ok(registry)
    }

    pub fn swap(&self, name: &str) -> Result<Arc<dyn SwapAdapter>> {
        match self.swaps.get(name) {
            Some(adapter) => Ok(adapter.clone()),
            None => bail!("unknown swap adapter: {}", name),
        }
    }

    pub fn bridge(&self, name: &str) -> Result<Arc<dyn BridgeAdapter>> {
        match self.bridges.get(name) {
            Some(adapter) => Ok(adapter.clone()),
            None => bail!("unknown bridge adapter: {}", name),
        }
    }

    pub fn mint(&self, name: &str) -> Result<Arc<dyn MintAdapter>> {
        match self.mints.get(name) {
            Some(adapter) => Ok(adapter.clone()),
            None => bail!("unknown mint adapter: {}", name),
        }
    }

    /// Every configured swap adapter; consolidation picks among these
    pub fn swap_adapters(&self) -> Vec<Arc<dyn SwapAdapter>> {
        self.swaps.values().cloned().collect()
    }
}
