//! TraderCore - sequences every account through every planned project

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::accounting::AccountingApi;
use crate::domain::adapters::{BridgeAdapter, MintAdapter, SwapAdapter};
use crate::domain::amount::AmountBounds;
use crate::domain::chain::ChainClient;
use crate::domain::oracles::{GasOracle, PriceOracle};
use crate::domain::planner::{plan, PlanOptions, Project, ProjectAction};
use crate::domain::trader::{
    ActionAuthorizer, AuthOutcome, ControlHandle, ExecutionState, GasGate, GateOutcome,
};
use crate::shared::errors::{ChainError, TradeError};
use crate::shared::types::{Account, AccountIdentity, ActionKind, AmountSpec, TokenInfo, TxHandle};
use crate::shared::utils::{explorer_tx_url, random_float_diff, raw_to_units};

const SNAPSHOT_ATTEMPTS: u32 = 3;
const SNAPSHOT_RETRY_SECS: u64 = 3;

/// Engine configuration distilled from the config file
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub base_symbol: String,
    pub explorer_url: String,
    pub slippage_percent: f64,
    /// Reserve kept on every account, in USD
    pub keep_amount_usd: f64,
    pub shuffle_accounts: bool,
    pub randomize_single_swap: bool,
    pub randomize_single_mint: bool,
    pub account_delay_secs: (u64, u64),
    pub project_delay_secs: (u64, u64),
    pub gas_ceiling_gwei: Option<f64>,
    pub gas_poll_interval_secs: u64,
    pub confirmation_poll_secs: u64,
    /// Tokens scanned by consolidation projects
    pub tokens: Vec<TokenInfo>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_symbol: "ETH".to_string(),
            explorer_url: "https://explorer.example/".to_string(),
            slippage_percent: 1.0,
            keep_amount_usd: 0.0,
            shuffle_accounts: false,
            randomize_single_swap: false,
            randomize_single_mint: false,
            account_delay_secs: (0, 0),
            project_delay_secs: (0, 0),
            gas_ceiling_gwei: None,
            gas_poll_interval_secs: 60,
            confirmation_poll_secs: 5,
            tokens: Vec::new(),
        }
    }
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub accounts_processed: usize,
    pub accounts_skipped: usize,
    pub actions_succeeded: u32,
    pub actions_failed: u32,
    pub actions_skipped: u32,
    pub stopped: bool,
}

/// Balance + deployment observation taken once per account
#[derive(Debug, Clone, Copy)]
struct AccountSnapshot {
    balance: f64,
    deployed: bool,
}

enum ProjectOutcome {
    Completed,
    Skipped,
    Stopped,
}

impl<T> From<AuthOutcome<T>> for ProjectOutcome {
    fn from(outcome: AuthOutcome<T>) -> Self {
        match outcome {
            AuthOutcome::Completed(_) => ProjectOutcome::Completed,
            AuthOutcome::Stopped => ProjectOutcome::Stopped,
        }
    }
}

/// The execution engine. Runs the whole account x project loop on one
/// sequential task; a controller may pause/resume/stop concurrently
/// through the `ControlHandle`.
pub struct TraderEngine {
    chain: Arc<dyn ChainClient>,
    price_oracle: Arc<dyn PriceOracle>,
    authorizer: ActionAuthorizer,
    gas_gate: GasGate,
    state: Arc<ExecutionState>,
    swap_adapters: Vec<Arc<dyn SwapAdapter>>,
    settings: EngineSettings,
}

impl TraderEngine {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        price_oracle: Arc<dyn PriceOracle>,
        gas_oracle: Arc<dyn GasOracle>,
        accounting: Arc<dyn AccountingApi>,
        swap_adapters: Vec<Arc<dyn SwapAdapter>>,
        settings: EngineSettings,
    ) -> Self {
        let state = Arc::new(ExecutionState::new());
        let authorizer = ActionAuthorizer::new(accounting, state.clone());
        let gas_gate = GasGate::new(
            gas_oracle,
            state.clone(),
            settings.gas_ceiling_gwei,
            Duration::from_secs(settings.gas_poll_interval_secs),
        );
        Self {
            chain,
            price_oracle,
            authorizer,
            gas_gate,
            state,
            swap_adapters,
            settings,
        }
    }

    /// Controller surface; safe to clone into other tasks
    pub fn control(&self) -> ControlHandle {
        ControlHandle::new(self.state.clone())
    }

    /// Run every account through its freshly planned project sequence.
    /// Accounts and projects are immutable for the whole run.
    pub async fn run(&self, accounts: &[Account], projects: &[Project]) -> RunReport {
        self.state.reset();
        let started_at = Utc::now();
        let mut report = RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            finished_at: started_at,
            accounts_processed: 0,
            accounts_skipped: 0,
            actions_succeeded: 0,
            actions_failed: 0,
            actions_skipped: 0,
            stopped: false,
        };

        let mut order: Vec<&Account> = accounts.iter().collect();
        if self.settings.shuffle_accounts {
            let mut rng = rand::thread_rng();
            order.shuffle(&mut rng);
        }

        match self.price_oracle.price_usd(&self.settings.base_symbol).await {
            Ok(price) => info!("{} price: {:.2}$", self.settings.base_symbol, price),
            Err(err) => warn!("Price lookup failed: {}", err),
        }

        let plan_options = PlanOptions {
            randomize_single_swap: self.settings.randomize_single_swap,
            randomize_single_mint: self.settings.randomize_single_mint,
        };

        'accounts: for (index, account) in order.iter().enumerate() {
            if !self.state.checkpoint().await {
                report.stopped = true;
                break;
            }

            let snapshot = match self.fetch_snapshot(account).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    error!("Skipping account {}: {}", account.short_address(), err);
                    report.accounts_skipped += 1;
                    continue;
                }
            };
            info!(
                "Account {} ({:.4} {})",
                account.short_address(),
                snapshot.balance,
                self.settings.base_symbol
            );

            // fresh per-account plan, re-randomized each time
            let planned = {
                let mut rng = rand::thread_rng();
                plan(projects, &plan_options, &mut rng)
            };
            let total = planned.len();

            for (position, project) in planned.iter().enumerate() {
                if !self.state.checkpoint().await {
                    report.stopped = true;
                    break 'accounts;
                }
                if project.requires_deployed() && !snapshot.deployed {
                    error!("Account not deployed yet");
                    break;
                }
                if self.gas_gate.wait_for_acceptable_gas().await == GateOutcome::Stopped {
                    report.stopped = true;
                    break 'accounts;
                }

                let wait_for_tx = position + 1 != total;
                match self
                    .execute_project(account, &snapshot, project, wait_for_tx)
                    .await
                {
                    Ok(ProjectOutcome::Completed) => {
                        self.state.record_success();
                        report.actions_succeeded += 1;
                    }
                    Ok(ProjectOutcome::Skipped) => report.actions_skipped += 1,
                    Ok(ProjectOutcome::Stopped) => {
                        report.stopped = true;
                        break 'accounts;
                    }
                    Err(err) => {
                        error!("Project {} failed: {}", project.name(), err);
                        report.actions_failed += 1;
                    }
                }

                // no throttling while nothing has succeeded yet
                if position + 1 < total && self.state.successes() > 0 {
                    if !self.random_delay(self.settings.project_delay_secs).await {
                        report.stopped = true;
                        break 'accounts;
                    }
                }
            }

            report.accounts_processed += 1;
            if index + 1 < order.len() && self.state.successes() > 0 {
                if !self.random_delay(self.settings.account_delay_secs).await {
                    report.stopped = true;
                    break;
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Run {} finished: {} succeeded, {} failed, {} skipped across {} accounts{}",
            report.run_id,
            report.actions_succeeded,
            report.actions_failed,
            report.actions_skipped,
            report.accounts_processed,
            if report.stopped { " (stopped)" } else { "" }
        );
        report
    }

    async fn fetch_snapshot(&self, account: &Account) -> Result<AccountSnapshot, TradeError> {
        let mut attempt = 1;
        loop {
            let result = async {
                let balance = self.chain.balance(account.address).await?;
                let deployed = self.chain.is_deployed(account.address).await?;
                Ok::<_, ChainError>(AccountSnapshot { balance, deployed })
            }
            .await;
            match result {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) if err.is_transient() && attempt < SNAPSHOT_ATTEMPTS => {
                    warn!(
                        "Balance lookup failed: {} (attempt {}/{})",
                        err, attempt, SNAPSHOT_ATTEMPTS
                    );
                    if !self
                        .state
                        .sleep_interruptible(Duration::from_secs(SNAPSHOT_RETRY_SECS))
                        .await
                    {
                        return Err(err.into());
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn execute_project(
        &self,
        account: &Account,
        snapshot: &AccountSnapshot,
        project: &Project,
        wait_for_tx: bool,
    ) -> Result<ProjectOutcome, TradeError> {
        let identity = AccountIdentity::from_address(account.address);
        match &project.action {
            ProjectAction::Swap(adapter) => {
                let Some(spec) = &project.amount else {
                    warn!("{} has no amount spec, skipping", project.name());
                    return Ok(ProjectOutcome::Skipped);
                };
                let price = self
                    .price_oracle
                    .price_usd(&self.settings.base_symbol)
                    .await
                    .map_err(TradeError::from)?;
                let reserve = self.settings.keep_amount_usd / price;
                // amount bounds from the freshest balance observation
                let bounds = match AmountBounds::compute(snapshot.balance, reserve, price, spec) {
                    Ok(bounds) => bounds,
                    Err(err @ TradeError::InsufficientBalance { .. }) => {
                        warn!("Skipping {}: {}", project.name(), err);
                        return Ok(ProjectOutcome::Skipped);
                    }
                    Err(err) => return Err(err),
                };
                let (amount, token) = {
                    let mut rng = rand::thread_rng();
                    (
                        bounds.draw(&mut rng),
                        adapter.supported_tokens().choose(&mut rng).cloned(),
                    )
                };
                let Some(token) = token else {
                    warn!("{} has no supported tokens configured", adapter.name());
                    return Ok(ProjectOutcome::Skipped);
                };
                info!(
                    "Swap {}: {:.4} {} -> {}",
                    adapter.name(),
                    amount,
                    self.settings.base_symbol,
                    token.symbol
                );
                let outcome = self
                    .authorizer
                    .authorize_and_run(ActionKind::Swap, &identity, || {
                        self.execute_swap(account, adapter, amount, &token, wait_for_tx)
                    })
                    .await?;
                Ok(outcome.into())
            }
            ProjectAction::BridgeDeposit(adapter) => {
                if account.l1_private_key.is_none() {
                    warn!(
                        "Account {} has no L1 key, skipping {}",
                        account.short_address(),
                        project.name()
                    );
                    return Ok(ProjectOutcome::Skipped);
                }
                let Some(AmountSpec::Native(lo, hi)) = project.amount.clone() else {
                    warn!("{} needs a native amount range, skipping", project.name());
                    return Ok(ProjectOutcome::Skipped);
                };
                let network = project.network.clone().unwrap_or_default();
                let amount = {
                    let mut rng = rand::thread_rng();
                    random_float_diff(&mut rng, lo, hi, 2)
                };
                info!(
                    "Bridge {} from {} -> {:.4} {}",
                    adapter.name(),
                    network,
                    amount,
                    self.settings.base_symbol
                );
                let outcome = self
                    .authorizer
                    .authorize_and_run(ActionKind::Bridge, &identity, || {
                        self.execute_deposit(account, adapter, &network, amount)
                    })
                    .await?;
                Ok(outcome.into())
            }
            ProjectAction::BridgeWithdraw(adapter) => {
                let Some(AmountSpec::Percent(lo, hi)) = project.amount.clone() else {
                    warn!("{} needs a percent range, skipping", project.name());
                    return Ok(ProjectOutcome::Skipped);
                };
                let network = project.network.clone().unwrap_or_default();
                let percent = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(lo..=hi)
                };
                info!(
                    "Back bridge {} to {} -> {}% of balance",
                    adapter.name(),
                    network,
                    percent
                );
                let outcome = self
                    .authorizer
                    .authorize_and_run(ActionKind::Bridge, &identity, || {
                        self.execute_withdraw(account, adapter, &network, percent, wait_for_tx)
                    })
                    .await?;
                Ok(outcome.into())
            }
            ProjectAction::Mint(adapter) => {
                info!("Mint {}", adapter.name());
                let outcome = self
                    .authorizer
                    .authorize_and_run(ActionKind::Nft, &identity, || {
                        self.execute_mint(account, adapter, wait_for_tx)
                    })
                    .await?;
                Ok(outcome.into())
            }
            ProjectAction::Consolidate {
                max_tokens,
                min_usd,
            } => self.consolidate(account, *max_tokens, *min_usd).await,
        }
    }

    /// Convert scattered token balances back to the base asset
    async fn consolidate(
        &self,
        account: &Account,
        max_tokens: usize,
        min_usd: f64,
    ) -> Result<ProjectOutcome, TradeError> {
        info!("Looking up for the tokens...");
        let mut candidates = Vec::new();
        for token in &self.settings.tokens {
            if !self.state.checkpoint().await {
                return Ok(ProjectOutcome::Stopped);
            }
            let raw = self.chain.token_balance(token, account.address).await?;
            if raw.is_zero() {
                continue;
            }
            let units = raw_to_units(raw, token.decimals);
            let balance_usd = if token.stable {
                units
            } else {
                units * self.price_oracle.price_usd(&token.symbol).await?
            };
            if balance_usd > min_usd {
                candidates.push((token.clone(), raw, units, balance_usd));
            }
            if candidates.len() >= max_tokens {
                break;
            }
        }
        if candidates.is_empty() {
            info!("No token balances above {:.2} USD", min_usd);
            return Ok(ProjectOutcome::Skipped);
        }
        {
            let mut rng = rand::thread_rng();
            candidates.shuffle(&mut rng);
        }

        let identity = AccountIdentity::from_address(account.address);
        let total = candidates.len();
        let mut any_success = false;
        for (position, (token, raw, units, balance_usd)) in candidates.iter().enumerate() {
            if !self.state.checkpoint().await {
                return Ok(ProjectOutcome::Stopped);
            }
            let adapter = {
                let mut rng = rand::thread_rng();
                let supporting: Vec<&Arc<dyn SwapAdapter>> = self
                    .swap_adapters
                    .iter()
                    .filter(|adapter| adapter.supports_token(&token.symbol))
                    .collect();
                supporting.choose(&mut rng).map(|adapter| Arc::clone(adapter))
            };
            let Some(adapter) = adapter else {
                warn!("No adapter supports token {}", token.symbol);
                continue;
            };
            let wait_for_tx = position + 1 != total;
            info!(
                "Swap {}: {:.4} {} ({:.4} USD) -> {}",
                adapter.name(),
                units,
                token.symbol,
                balance_usd,
                self.settings.base_symbol
            );
            match self
                .authorizer
                .authorize_and_run(ActionKind::Swap, &identity, || {
                    self.execute_token_swap(account, &adapter, token, *raw, wait_for_tx)
                })
                .await
            {
                Ok(AuthOutcome::Completed(_)) => any_success = true,
                Ok(AuthOutcome::Stopped) => return Ok(ProjectOutcome::Stopped),
                Err(err) => error!("Consolidation swap failed: {}", err),
            }
        }
        Ok(if any_success {
            ProjectOutcome::Completed
        } else {
            ProjectOutcome::Skipped
        })
    }

    async fn execute_swap(
        &self,
        account: &Account,
        adapter: &Arc<dyn SwapAdapter>,
        amount: f64,
        token: &TokenInfo,
        wait_for_tx: bool,
    ) -> Result<TxHandle, TradeError> {
        let tx = adapter
            .swap_to_token(account, amount, token, self.settings.slippage_percent)
            .await?;
        info!("{}", explorer_tx_url(&self.settings.explorer_url, &tx.to_string()));
        self.maybe_wait(&tx, wait_for_tx).await?;
        Ok(tx)
    }

    async fn execute_token_swap(
        &self,
        account: &Account,
        adapter: &Arc<dyn SwapAdapter>,
        token: &TokenInfo,
        amount_raw: ethers::types::U256,
        wait_for_tx: bool,
    ) -> Result<TxHandle, TradeError> {
        let tx = adapter
            .swap_to_base(account, token, amount_raw, self.settings.slippage_percent)
            .await?;
        info!("{}", explorer_tx_url(&self.settings.explorer_url, &tx.to_string()));
        self.maybe_wait(&tx, wait_for_tx).await?;
        Ok(tx)
    }

    async fn execute_deposit(
        &self,
        account: &Account,
        adapter: &Arc<dyn BridgeAdapter>,
        network: &str,
        amount: f64,
    ) -> Result<TxHandle, TradeError> {
        let tx = adapter.deposit(account, network, amount).await?;
        info!("Bridge transaction {}", tx);
        Ok(tx)
    }

    async fn execute_withdraw(
        &self,
        account: &Account,
        adapter: &Arc<dyn BridgeAdapter>,
        network: &str,
        percent: u32,
        wait_for_tx: bool,
    ) -> Result<TxHandle, TradeError> {
        let tx = adapter.withdraw(account, network, percent).await?;
        info!("{}", explorer_tx_url(&self.settings.explorer_url, &tx.to_string()));
        self.maybe_wait(&tx, wait_for_tx).await?;
        Ok(tx)
    }

    async fn execute_mint(
        &self,
        account: &Account,
        adapter: &Arc<dyn MintAdapter>,
        wait_for_tx: bool,
    ) -> Result<TxHandle, TradeError> {
        let tx = adapter.mint(account).await?;
        info!("{}", explorer_tx_url(&self.settings.explorer_url, &tx.to_string()));
        self.maybe_wait(&tx, wait_for_tx).await?;
        Ok(tx)
    }

    async fn maybe_wait(&self, tx: &TxHandle, wait_for_tx: bool) -> Result<(), TradeError> {
        if wait_for_tx {
            debug!("Waiting for tx confirmation...");
            self.chain
                .wait_for_confirmation(
                    tx,
                    Duration::from_secs(self.settings.confirmation_poll_secs),
                )
                .await?;
        }
        Ok(())
    }

    async fn random_delay(&self, range: (u64, u64)) -> bool {
        let secs = {
            let mut rng = rand::thread_rng();
            rng.gen_range(range.0..=range.1)
        };
        if secs == 0 {
            return !self.state.is_stopped();
        }
        debug!("Delay for {} sec.", secs);
        self.state
            .sleep_interruptible(Duration::from_secs(secs))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ethers::signers::LocalWallet;
    use ethers::types::{Address, Bytes, H256, U256};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::shared::errors::{ApiError, OracleError};
    use crate::shared::types::{AuthorizationTicket, UserInfo};

    struct MockChain {
        balance: f64,
        deployed: bool,
        token_balances: HashMap<String, U256>,
        confirmations: AtomicU32,
    }

    impl MockChain {
        fn new(balance: f64, deployed: bool) -> Self {
            Self {
                balance,
                deployed,
                token_balances: HashMap::new(),
                confirmations: AtomicU32::new(0),
            }
        }

        fn with_token_balance(mut self, symbol: &str, raw: U256) -> Self {
            self.token_balances.insert(symbol.to_string(), raw);
            self
        }

        fn confirmations(&self) -> u32 {
            self.confirmations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChainClient for MockChain {
        async fn balance(&self, _address: Address) -> Result<f64, ChainError> {
            Ok(self.balance)
        }

        async fn balance_wei(&self, _address: Address) -> Result<U256, ChainError> {
            Ok(crate::shared::utils::ether_to_wei(self.balance))
        }

        async fn is_deployed(&self, _address: Address) -> Result<bool, ChainError> {
            Ok(self.deployed)
        }

        async fn token_balance(
            &self,
            token: &TokenInfo,
            _owner: Address,
        ) -> Result<U256, ChainError> {
            Ok(self
                .token_balances
                .get(&token.symbol)
                .copied()
                .unwrap_or_default())
        }

        async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, ChainError> {
            Ok(Bytes::new())
        }

        async fn submit(
            &self,
            _wallet: &LocalWallet,
            _to: Address,
            _value: U256,
            _data: Bytes,
        ) -> Result<TxHandle, ChainError> {
            Ok(TxHandle::new(H256::zero()))
        }

        async fn wait_for_confirmation(
            &self,
            _tx: &TxHandle,
            _poll_interval: Duration,
        ) -> Result<(), ChainError> {
            self.confirmations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockPriceOracle(f64);

    #[async_trait]
    impl PriceOracle for MockPriceOracle {
        async fn price_usd(&self, _symbol: &str) -> Result<f64, OracleError> {
            Ok(self.0)
        }
    }

    struct MockGasOracle(f64);

    #[async_trait]
    impl GasOracle for MockGasOracle {
        async fn gas_price_gwei(&self) -> Result<f64, OracleError> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct MockAccounting {
        authorizations: AtomicU32,
        refunds: AtomicU32,
    }

    #[async_trait]
    impl AccountingApi for MockAccounting {
        async fn new_action(
            &self,
            _action: ActionKind,
            _identity: &AccountIdentity,
        ) -> Result<AuthorizationTicket, ApiError> {
            let id = self.authorizations.fetch_add(1, Ordering::SeqCst) as i64 + 1;
            Ok(AuthorizationTicket {
                cancel_id: id,
                whitelisted: false,
                new_balance: 100,
            })
        }

        async fn cancel_action(&self, _ticket: &AuthorizationTicket) -> Result<(), ApiError> {
            self.refunds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn user_info(&self) -> Result<UserInfo, ApiError> {
            Ok(UserInfo {
                user: "mock".to_string(),
                balance: 100,
            })
        }
    }

    struct MockSwapAdapter {
        name: String,
        tokens: Vec<TokenInfo>,
        fail_for: Mutex<Option<Address>>,
        swaps: AtomicU32,
    }

    impl MockSwapAdapter {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                tokens: vec![usdc()],
                fail_for: Mutex::new(None),
                swaps: AtomicU32::new(0),
            }
        }

        fn failing_for(self, address: Address) -> Self {
            *self.fail_for.lock().unwrap() = Some(address);
            self
        }

        fn swaps(&self) -> u32 {
            self.swaps.load(Ordering::SeqCst)
        }

        fn check(&self, address: Address) -> Result<TxHandle, ChainError> {
            if *self.fail_for.lock().unwrap() == Some(address) {
                return Err(ChainError::Rpc("execution failed".to_string()));
            }
            self.swaps.fetch_add(1, Ordering::SeqCst);
            Ok(TxHandle::new(H256::zero()))
        }
    }

    #[async_trait]
    impl SwapAdapter for MockSwapAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn supported_tokens(&self) -> &[TokenInfo] {
            &self.tokens
        }

        async fn swap_to_token(
            &self,
            account: &Account,
            _amount_native: f64,
            _token: &TokenInfo,
            _slippage_percent: f64,
        ) -> Result<TxHandle, ChainError> {
            self.check(account.address)
        }

        async fn swap_to_base(
            &self,
            account: &Account,
            _token: &TokenInfo,
            _amount_raw: U256,
            _slippage_percent: f64,
        ) -> Result<TxHandle, ChainError> {
            self.check(account.address)
        }
    }

    fn usdc() -> TokenInfo {
        TokenInfo {
            symbol: "USDC".to_string(),
            address: Address::zero(),
            decimals: 6,
            stable: true,
        }
    }

    fn account() -> Account {
        let wallet: LocalWallet =
            "0000000000000000000000000000000000000000000000000000000000000001"
                .parse()
                .unwrap();
        Account::new(Address::random(), wallet, None)
    }

    fn swap_project(adapter: Arc<MockSwapAdapter>) -> Project {
        Project {
            action: ProjectAction::Swap(adapter),
            amount: Some(AmountSpec::Usd(100.0, 200.0)),
            network: None,
        }
    }

    struct Harness {
        chain: Arc<MockChain>,
        accounting: Arc<MockAccounting>,
        adapter: Arc<MockSwapAdapter>,
        engine: Arc<TraderEngine>,
    }

    fn harness(chain: MockChain, adapter: MockSwapAdapter, settings: EngineSettings) -> Harness {
        let chain = Arc::new(chain);
        let accounting = Arc::new(MockAccounting::default());
        let adapter = Arc::new(adapter);
        let engine = Arc::new(TraderEngine::new(
            chain.clone(),
            Arc::new(MockPriceOracle(2000.0)),
            Arc::new(MockGasOracle(10.0)),
            accounting.clone(),
            vec![adapter.clone() as Arc<dyn SwapAdapter>],
            settings,
        ));
        Harness {
            chain,
            accounting,
            adapter,
            engine,
        }
    }

    #[tokio::test]
    async fn runs_every_project_for_every_account() {
        let h = harness(
            MockChain::new(1.0, true),
            MockSwapAdapter::new("mockswap"),
            EngineSettings::default(),
        );
        let accounts = vec![account(), account()];
        let adapter = h.adapter.clone();
        let projects = vec![
            swap_project(adapter.clone()),
            swap_project(adapter.clone()),
        ];

        let report = h.engine.run(&accounts, &projects).await;

        assert_eq!(report.actions_succeeded, 4);
        assert_eq!(report.actions_failed, 0);
        assert_eq!(report.accounts_processed, 2);
        assert!(!report.stopped);
        assert_eq!(h.accounting.authorizations.load(Ordering::SeqCst), 4);
        assert_eq!(h.adapter.swaps(), 4);
        // only the non-final project of each account waits for its tx
        assert_eq!(h.chain.confirmations(), 2);
    }

    #[tokio::test]
    async fn undeployed_account_aborts_contract_projects() {
        let h = harness(
            MockChain::new(1.0, false),
            MockSwapAdapter::new("mockswap"),
            EngineSettings::default(),
        );
        let accounts = vec![account()];
        let projects = vec![swap_project(h.adapter.clone())];

        let report = h.engine.run(&accounts, &projects).await;

        assert_eq!(report.actions_succeeded, 0);
        assert_eq!(report.accounts_processed, 1);
        assert_eq!(h.accounting.authorizations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reserve_above_balance_skips_the_project() {
        let settings = EngineSettings {
            keep_amount_usd: 500.0, // 0.25 ETH at 2000$, balance is 0.1
            ..EngineSettings::default()
        };
        let h = harness(
            MockChain::new(0.1, true),
            MockSwapAdapter::new("mockswap"),
            settings,
        );
        let accounts = vec![account()];
        let projects = vec![swap_project(h.adapter.clone())];

        let report = h.engine.run(&accounts, &projects).await;

        assert_eq!(report.actions_skipped, 1);
        assert_eq!(report.actions_succeeded, 0);
        assert_eq!(h.accounting.authorizations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_blocks_before_the_next_checkpoint_and_resume_continues() {
        let settings = EngineSettings {
            project_delay_secs: (10, 10),
            ..EngineSettings::default()
        };
        let h = harness(
            MockChain::new(1.0, true),
            MockSwapAdapter::new("mockswap"),
            settings,
        );
        let accounts = vec![account()];
        let projects = vec![
            swap_project(h.adapter.clone()),
            swap_project(h.adapter.clone()),
        ];
        let control = h.engine.control();
        let engine = h.engine.clone();

        let task = tokio::spawn(async move { engine.run(&accounts, &projects).await });

        // first project lands, inter-project delay starts
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.accounting.authorizations.load(Ordering::SeqCst), 1);
        control.pause();

        // paused across the delay boundary: nothing new happens
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.accounting.authorizations.load(Ordering::SeqCst), 1);
        assert!(!task.is_finished());

        control.resume();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let report = task.await.unwrap();
        // second project ran exactly once after resume
        assert_eq!(report.actions_succeeded, 2);
        assert_eq!(h.accounting.authorizations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_gas_gate_wait() {
        let settings = EngineSettings {
            gas_ceiling_gwei: Some(30.0),
            ..EngineSettings::default()
        };
        let chain = Arc::new(MockChain::new(1.0, true));
        let accounting = Arc::new(MockAccounting::default());
        let adapter = Arc::new(MockSwapAdapter::new("mockswap"));
        let engine = Arc::new(TraderEngine::new(
            chain,
            Arc::new(MockPriceOracle(2000.0)),
            Arc::new(MockGasOracle(100.0)), // permanently above the ceiling
            accounting.clone(),
            vec![adapter.clone() as Arc<dyn SwapAdapter>],
            settings,
        ));
        let control = engine.control();
        let accounts = vec![account()];
        let projects = vec![swap_project(adapter)];

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run(&accounts, &projects).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        control.stop();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let report = task.await.unwrap();
        assert!(report.stopped);
        assert_eq!(report.actions_succeeded, 0);
        assert_eq!(accounting.authorizations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_account_does_not_trigger_throttle_delays() {
        let failing = account();
        let settings = EngineSettings {
            account_delay_secs: (1000, 1000),
            ..EngineSettings::default()
        };
        let h = harness(
            MockChain::new(1.0, true),
            MockSwapAdapter::new("mockswap").failing_for(failing.address),
            settings,
        );
        let accounts = vec![failing, account()];
        let projects = vec![swap_project(h.adapter.clone())];

        let started = tokio::time::Instant::now();
        let report = h.engine.run(&accounts, &projects).await;

        assert_eq!(report.actions_failed, 1);
        assert_eq!(report.actions_succeeded, 1);
        // failed ticket was refunded
        assert_eq!(h.accounting.refunds.load(Ordering::SeqCst), 1);
        // nothing had succeeded when the first account finished, so the
        // inter-account delay was skipped
        assert!(started.elapsed() < Duration::from_secs(1000));
    }

    #[tokio::test]
    async fn consolidation_swaps_tokens_back_to_base() {
        let chain = MockChain::new(1.0, true)
            .with_token_balance("USDC", U256::from(50_000_000u64)); // 50 USDC
        let settings = EngineSettings {
            tokens: vec![usdc()],
            ..EngineSettings::default()
        };
        let h = harness(chain, MockSwapAdapter::new("mockswap"), settings);
        let accounts = vec![account()];
        let projects = vec![Project {
            action: ProjectAction::Consolidate {
                max_tokens: 3,
                min_usd: 1.0,
            },
            amount: None,
            network: None,
        }];

        let report = h.engine.run(&accounts, &projects).await;

        assert_eq!(report.actions_succeeded, 1);
        assert_eq!(h.adapter.swaps(), 1);
        assert_eq!(h.accounting.authorizations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn consolidation_ignores_dust_below_the_floor() {
        let chain = MockChain::new(1.0, true)
            .with_token_balance("USDC", U256::from(500_000u64)); // 0.5 USDC
        let settings = EngineSettings {
            tokens: vec![usdc()],
            ..EngineSettings::default()
        };
        let h = harness(chain, MockSwapAdapter::new("mockswap"), settings);
        let accounts = vec![account()];
        let projects = vec![Project {
            action: ProjectAction::Consolidate {
                max_tokens: 3,
                min_usd: 1.0,
            },
            amount: None,
            network: None,
        }];

        let report = h.engine.run(&accounts, &projects).await;

        assert_eq!(report.actions_succeeded, 0);
        assert_eq!(report.actions_skipped, 1);
        assert_eq!(h.adapter.swaps(), 0);
    }
}
