// src/app.rs
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, ProjectCfg, ProjectKindCfg};
use crate::domain::accounting::AccountingApi;
use crate::domain::planner::{Project, ProjectAction};
use crate::domain::trader::{EngineSettings, TraderEngine};
use crate::infrastructure::accounting::AccountingClient;
use crate::infrastructure::accounts::load_accounts_csv;
use crate::infrastructure::chain::EvmChainClient;
use crate::infrastructure::oracles::{BinancePriceOracle, GasTrackerOracle};
use crate::infrastructure::protocols::AdapterRegistry;
use crate::shared::types::{AmountSpec, TokenInfo};

pub async fn run(config_path: &str, accounts_path: &str) -> Result<()> {
    let config = Config::from_file(config_path)?;
    let accounts = load_accounts_csv(accounts_path)?;
    if accounts.is_empty() {
        bail!("no accounts loaded from {}", accounts_path);
    }
    info!("Loaded {} accounts", accounts.len());

    let tokens: Vec<TokenInfo> = config
        .tokens
        .iter()
        .map(|t| t.to_token_info())
        .collect::<Result<_>>()?;

    let l2_chain = Arc::new(EvmChainClient::new(
        &config.network.rpc,
        config.network.chain_id,
    )?);
    let l1_chain = Arc::new(EvmChainClient::new(
        &config.network.l1.rpc,
        config.network.l1.chain_id,
    )?);

    let registry = AdapterRegistry::build(
        &config.adapters,
        &tokens,
        l1_chain.clone(),
        l2_chain.clone(),
    )?;
    let projects = build_projects(&config.projects, &registry)?;
    if projects.is_empty() {
        bail!("no projects selected");
    }

    let accounting = Arc::new(AccountingClient::new(
        config.api.base_url.clone(),
        config.api.key.clone(),
    ));
    match accounting.user_info().await {
        Ok(user) => info!("Accounting user: {} ({} points)", user.user, user.balance),
        Err(err) => warn!("Accounting service check failed: {}", err),
    }

    let settings = EngineSettings {
        base_symbol: config.trade.base_symbol.clone(),
        explorer_url: config.network.explorer.clone(),
        slippage_percent: config.trade.slippage_percent,
        keep_amount_usd: config.trade.keep_amount_usd,
        shuffle_accounts: config.trade.shuffle_accounts,
        randomize_single_swap: config.trade.randomize_single_swap,
        randomize_single_mint: config.trade.randomize_single_mint,
        account_delay_secs: (config.delays.account_min_secs, config.delays.account_max_secs),
        project_delay_secs: (config.delays.project_min_secs, config.delays.project_max_secs),
        gas_ceiling_gwei: config.gas.ceiling_gwei,
        gas_poll_interval_secs: config.gas.poll_interval_secs,
        confirmation_poll_secs: 5,
        tokens,
    };

    let engine = Arc::new(TraderEngine::new(
        l2_chain,
        Arc::new(BinancePriceOracle::new()),
        Arc::new(GasTrackerOracle::new()),
        accounting,
        registry.swap_adapters(),
        settings,
    ));

    // bridge Ctrl-C to a cooperative stop; the current operation finishes
    let control = engine.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current operation...");
            control.stop();
        }
    });

    let report = engine.run(&accounts, &projects).await;

    info!("📊 Run summary:");
    info!("   Accounts processed: {}", report.accounts_processed);
    info!("   Accounts skipped: {}", report.accounts_skipped);
    info!("   Actions succeeded: {}", report.actions_succeeded);
    info!("   Actions failed: {}", report.actions_failed);
    info!("   Actions skipped: {}", report.actions_skipped);
    if report.stopped {
        info!("   Run was stopped by the operator");
    }
    Ok(())
}

fn build_projects(configs: &[ProjectCfg], registry: &AdapterRegistry) -> Result<Vec<Project>> {
    configs
        .iter()
        .enumerate()
        .map(|(index, cfg)| {
            let adapter_name = || {
                cfg.adapter
                    .as_deref()
                    .with_context(|| format!("project #{} needs an adapter", index + 1))
            };
            Ok(match cfg.kind {
                ProjectKindCfg::Swap => Project {
                    action: ProjectAction::Swap(registry.swap(adapter_name()?)?),
                    amount: Some(swap_amount_spec(cfg, index)?),
                    network: None,
                },
                ProjectKindCfg::BridgeDeposit => {
                    let [lo, hi] = cfg.amount.with_context(|| {
                        format!("project #{} needs a native amount range", index + 1)
                    })?;
                    Project {
                        action: ProjectAction::BridgeDeposit(registry.bridge(adapter_name()?)?),
                        amount: Some(AmountSpec::Native(lo, hi)),
                        network: cfg.network.clone(),
                    }
                }
                ProjectKindCfg::BridgeWithdraw => {
                    let [lo, hi] = cfg.amount_percent.with_context(|| {
                        format!("project #{} needs a percent range", index + 1)
                    })?;
                    Project {
                        action: ProjectAction::BridgeWithdraw(registry.bridge(adapter_name()?)?),
                        amount: Some(AmountSpec::Percent(lo, hi)),
                        network: cfg.network.clone(),
                    }
                }
                ProjectKindCfg::Mint => Project {
                    action: ProjectAction::Mint(registry.mint(adapter_name()?)?),
                    amount: None,
                    network: None,
                },
                ProjectKindCfg::Consolidation => Project {
                    action: ProjectAction::Consolidate {
                        max_tokens: cfg.max_tokens.unwrap_or(1),
                        min_usd: cfg.min_usd.unwrap_or(1.0),
                    },
                    amount: None,
                    network: None,
                },
            })
        })
        .collect()
}

fn swap_amount_spec(cfg: &ProjectCfg, index: usize) -> Result<AmountSpec> {
    match (cfg.amount_usd, cfg.amount, cfg.amount_percent) {
        (Some([lo, hi]), None, None) => Ok(AmountSpec::Usd(lo, hi)),
        (None, Some([lo, hi]), None) => Ok(AmountSpec::Native(lo, hi)),
        (None, None, Some([lo, hi])) => Ok(AmountSpec::Percent(lo, hi)),
        _ => bail!(
            "project #{} needs exactly one amount range (amount_usd, amount or amount_percent)",
            index + 1
        ),
    }
}
