use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::{fs, path::Path};

use crate::shared::types::TokenInfo;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCfg {
    pub base_url: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct L1Cfg {
    pub rpc: Vec<String>,
    pub chain_id: u64,
    pub explorer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkCfg {
    pub rpc: Vec<String>,
    pub chain_id: u64,
    pub explorer: String,
    pub l1: L1Cfg,
}

fn default_gas_poll() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct GasCfg {
    pub ceiling_gwei: Option<f64>,
    #[serde(default = "default_gas_poll")]
    pub poll_interval_secs: u64,
}

fn default_base_symbol() -> String {
    "ETH".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeCfg {
    #[serde(default = "default_base_symbol")]
    pub base_symbol: String,
    pub slippage_percent: f64,
    #[serde(default)]
    pub keep_amount_usd: f64,
    #[serde(default)]
    pub shuffle_accounts: bool,
    #[serde(default)]
    pub randomize_single_swap: bool,
    #[serde(default)]
    pub randomize_single_mint: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelaysCfg {
    pub account_min_secs: u64,
    pub account_max_secs: u64,
    pub project_min_secs: u64,
    pub project_max_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenCfg {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
    #[serde(default)]
    pub stable: bool,
}

impl TokenCfg {
    pub fn to_token_info(&self) -> Result<TokenInfo> {
        Ok(TokenInfo {
            symbol: self.symbol.clone(),
            address: self
                .address
                .parse()
                .with_context(|| format!("bad address for token {}", self.symbol))?,
            decimals: self.decimals,
            stable: self.stable,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    V2Router,
    Orbiter,
    Mint,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterCfg {
    pub name: String,
    pub kind: AdapterKind,

    // v2_router
    pub router: Option<String>,
    pub weth: Option<String>,
    pub tokens: Option<Vec<String>>,

    // orbiter
    pub maker: Option<String>,
    pub trading_fee: Option<f64>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub networks: Option<HashMap<String, u32>>,

    // mint
    pub contract: Option<String>,
    pub function: Option<String>,
    #[serde(default)]
    pub mint_fee: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKindCfg {
    Swap,
    BridgeDeposit,
    BridgeWithdraw,
    Mint,
    Consolidation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectCfg {
    pub kind: ProjectKindCfg,
    pub adapter: Option<String>,
    pub network: Option<String>,
    /// USD range for swaps
    pub amount_usd: Option<[f64; 2]>,
    /// Native range for bridge deposits (and optionally swaps)
    pub amount: Option<[f64; 2]>,
    /// Percent-of-balance range for bridge withdrawals
    pub amount_percent: Option<[u32; 2]>,
    /// Consolidation: how many tokens to sweep at most
    pub max_tokens: Option<usize>,
    /// Consolidation: USD floor under which balances are ignored
    pub min_usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiCfg,
    pub network: NetworkCfg,
    pub gas: GasCfg,
    pub trade: TradeCfg,
    pub delays: DelaysCfg,
    #[serde(default)]
    pub tokens: Vec<TokenCfg>,
    #[serde(default)]
    pub adapters: Vec<AdapterCfg>,
    #[serde(default)]
    pub projects: Vec<ProjectCfg>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config {}", path.as_ref().display()))?;
        let config: Self = toml::from_str(&raw).context("parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.rpc.is_empty() {
            bail!("network.rpc must list at least one endpoint");
        }
        if self.network.l1.rpc.is_empty() {
            bail!("network.l1.rpc must list at least one endpoint");
        }
        if !(0.0..=100.0).contains(&self.trade.slippage_percent) {
            bail!("trade.slippage_percent must be between 0 and 100");
        }
        if self.delays.account_min_secs > self.delays.account_max_secs {
            bail!("delays.account_min_secs must not exceed delays.account_max_secs");
        }
        if self.delays.project_min_secs > self.delays.project_max_secs {
            bail!("delays.project_min_secs must not exceed delays.project_max_secs");
        }

        for adapter in &self.adapters {
            match adapter.kind {
                AdapterKind::V2Router => {
                    if adapter.router.is_none() || adapter.weth.is_none() {
                        bail!("adapter {} needs router and weth addresses", adapter.name);
                    }
                    for symbol in adapter.tokens.as_deref().unwrap_or_default() {
                        if !self.tokens.iter().any(|t| &t.symbol == symbol) {
                            bail!(
                                "adapter {} references unknown token {}",
                                adapter.name,
                                symbol
                            );
                        }
                    }
                }
                AdapterKind::Orbiter => {
                    if adapter.maker.is_none()
                        || adapter.trading_fee.is_none()
                        || adapter.min_amount.is_none()
                        || adapter.max_amount.is_none()
                    {
                        bail!(
                            "adapter {} needs maker, trading_fee, min_amount and max_amount",
                            adapter.name
                        );
                    }
                }
                AdapterKind::Mint => {
                    if adapter.contract.is_none() || adapter.function.is_none() {
                        bail!("adapter {} needs contract and function", adapter.name);
                    }
                }
            }
        }

        for (index, project) in self.projects.iter().enumerate() {
            let adapter_kind = |name: &Option<String>| -> Result<AdapterKind> {
                let name = name
                    .as_deref()
                    .with_context(|| format!("project #{} needs an adapter", index + 1))?;
                self.adapters
                    .iter()
                    .find(|a| a.name == name)
                    .map(|a| a.kind)
                    .with_context(|| format!("project #{} references unknown adapter {}", index + 1, name))
            };
            match project.kind {
                ProjectKindCfg::Swap => {
                    if adapter_kind(&project.adapter)? != AdapterKind::V2Router {
                        bail!("project #{} needs a swap adapter", index + 1);
                    }
                    match (project.amount_usd, project.amount, project.amount_percent) {
                        (Some([lo, hi]), None, None) if lo <= hi => {}
                        (None, Some([lo, hi]), None) if lo <= hi => {}
                        (None, None, Some([lo, hi])) if lo <= hi && hi <= 100 => {}
                        _ => bail!(
                            "project #{} needs exactly one well-formed amount range",
                            index + 1
                        ),
                    }
                }
                ProjectKindCfg::BridgeDeposit => {
                    if adapter_kind(&project.adapter)? != AdapterKind::Orbiter {
                        bail!("project #{} needs a bridge adapter", index + 1);
                    }
                    match project.amount {
                        Some([lo, hi]) if lo <= hi => {}
                        _ => bail!("project #{} needs a native amount range", index + 1),
                    }
                    if project.network.is_none() {
                        bail!("project #{} needs a source network", index + 1);
                    }
                }
                ProjectKindCfg::BridgeWithdraw => {
                    if adapter_kind(&project.adapter)? != AdapterKind::Orbiter {
                        bail!("project #{} needs a bridge adapter", index + 1);
                    }
                    match project.amount_percent {
                        Some([lo, hi]) if lo >= 1 && lo <= hi && hi <= 100 => {}
                        _ => bail!("project #{} needs a percent range within 1..=100", index + 1),
                    }
                    if project.network.is_none() {
                        bail!("project #{} needs a destination network", index + 1);
                    }
                }
                ProjectKindCfg::Mint => {
                    if adapter_kind(&project.adapter)? != AdapterKind::Mint {
                        bail!("project #{} needs a mint adapter", index + 1);
                    }
                }
                ProjectKindCfg::Consolidation => {
                    if project.max_tokens.unwrap_or(0) == 0 {
                        bail!("project #{} needs max_tokens >= 1", index + 1);
                    }
                    if project.min_usd.is_none() {
                        bail!("project #{} needs a min_usd floor", index + 1);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [api]
        base_url = "https://points.example/api/"
        key = "k-123"

        [network]
        rpc = ["https://l2.rpc.example"]
        chain_id = 324
        explorer = "https://l2scan.example/"

        [network.l1]
        rpc = ["https://l1.rpc.example"]
        chain_id = 1
        explorer = "https://etherscan.io/"

        [gas]
        ceiling_gwei = 30.0

        [trade]
        slippage_percent = 1.0
        keep_amount_usd = 5.0
        shuffle_accounts = true

        [delays]
        account_min_secs = 60
        account_max_secs = 300
        project_min_secs = 30
        project_max_secs = 120

        [[tokens]]
        symbol = "USDC"
        address = "0x3355df6D4c9C3035724Fd0e3914dE96A5a83aaf4"
        decimals = 6
        stable = true

        [[adapters]]
        name = "syncswap"
        kind = "v2_router"
        router = "0x2da10A1e27bF85cEdD8FFb1AbBe97e53391C0295"
        weth = "0x5AEa5775959fBC2557Cc8789bC1bf90A239D9a91"
        tokens = ["USDC"]

        [[adapters]]
        name = "orbiter"
        kind = "orbiter"
        maker = "0x80C67432656d59144cEFf962E8fAF8926599bCF8"
        trading_fee = 0.0015
        min_amount = 0.005
        max_amount = 5.0
        networks = { mainnet = 1, arbitrum = 2 }

        [[adapters]]
        name = "drop"
        kind = "mint"
        contract = "0x1111111111111111111111111111111111111111"
        function = "mint()"

        [[projects]]
        kind = "swap"
        adapter = "syncswap"
        amount_usd = [10.0, 25.0]

        [[projects]]
        kind = "bridge_withdraw"
        adapter = "orbiter"
        network = "mainnet"
        amount_percent = [40, 60]

        [[projects]]
        kind = "consolidation"
        max_tokens = 3
        min_usd = 1.0
    "#;

    #[test]
    fn sample_config_parses_and_validates() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.trade.base_symbol, "ETH");
        assert_eq!(config.gas.poll_interval_secs, 60);
        assert_eq!(config.projects.len(), 3);
        assert!(config.tokens[0].to_token_info().unwrap().stable);
    }

    #[test]
    fn swap_project_requires_an_amount_range() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.projects[0].amount_usd = None;
        assert!(config.validate().is_err());

        config.projects[0].amount_usd = Some([50.0, 10.0]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn project_adapter_kind_must_match() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.projects[0].adapter = Some("orbiter".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_adapter_is_rejected() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.projects[0].adapter = Some("missing".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn withdraw_percent_must_stay_within_bounds() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.projects[1].amount_percent = Some([0, 50]);
        assert!(config.validate().is_err());
        config.projects[1].amount_percent = Some([10, 150]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn adapter_token_references_must_resolve() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.adapters[0].tokens = Some(vec!["WBTC".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_delay_ranges_are_rejected() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.delays.project_min_secs = 500;
        assert!(config.validate().is_err());
    }
}
