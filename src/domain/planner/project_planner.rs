//! Bucketed, partially-randomized project ordering

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::adapters::{BridgeAdapter, MintAdapter, SwapAdapter};
use crate::shared::types::{AmountSpec, ProjectKind};

/// What a project actually does when it is reached in the plan
#[derive(Clone)]
pub enum ProjectAction {
    Swap(Arc<dyn SwapAdapter>),
    BridgeDeposit(Arc<dyn BridgeAdapter>),
    BridgeWithdraw(Arc<dyn BridgeAdapter>),
    Mint(Arc<dyn MintAdapter>),
    Consolidate { max_tokens: usize, min_usd: f64 },
}

/// One configured category of on-chain operation with its amount policy
#[derive(Clone)]
pub struct Project {
    pub action: ProjectAction,
    pub amount: Option<AmountSpec>,
    /// Counterpart network for bridge projects
    pub network: Option<String>,
}

impl Project {
    pub fn kind(&self) -> ProjectKind {
        match self.action {
            ProjectAction::Swap(_) => ProjectKind::Swap,
            ProjectAction::BridgeDeposit(_) => ProjectKind::BridgeDeposit,
            ProjectAction::BridgeWithdraw(_) => ProjectKind::BridgeWithdraw,
            ProjectAction::Mint(_) => ProjectKind::Mint,
            ProjectAction::Consolidate { .. } => ProjectKind::Consolidation,
        }
    }

    /// Swaps, mints and consolidation need a deployed account contract;
    /// bridge transfers do not.
    pub fn requires_deployed(&self) -> bool {
        matches!(
            self.kind(),
            ProjectKind::Swap | ProjectKind::Mint | ProjectKind::Consolidation
        )
    }

    pub fn name(&self) -> String {
        match &self.action {
            ProjectAction::Swap(adapter) => format!("swap:{}", adapter.name()),
            ProjectAction::BridgeDeposit(adapter) => format!("bridge:{}", adapter.name()),
            ProjectAction::BridgeWithdraw(adapter) => format!("back-bridge:{}", adapter.name()),
            ProjectAction::Mint(adapter) => format!("mint:{}", adapter.name()),
            ProjectAction::Consolidate { .. } => "consolidation".to_string(),
        }
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name())
            .field("amount", &self.amount)
            .field("network", &self.network)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Collapse the swap bucket to one randomly chosen project
    pub randomize_single_swap: bool,
    /// Same for the mint bucket
    pub randomize_single_mint: bool,
}

/// Build the ordered per-account plan. Each bucket is shuffled
/// independently so on-chain signatures decorrelate across accounts;
/// cross-bucket order is fixed: swaps run first, deposits precede
/// withdrawals because funds must arrive before they can move onward.
pub fn plan<R: Rng + ?Sized>(
    projects: &[Project],
    options: &PlanOptions,
    rng: &mut R,
) -> Vec<Project> {
    let mut swaps = Vec::new();
    let mut mints = Vec::new();
    let mut deposits = Vec::new();
    let mut withdrawals = Vec::new();
    let mut other = Vec::new();

    for project in projects {
        match project.kind() {
            ProjectKind::Swap => swaps.push(project.clone()),
            ProjectKind::Mint => mints.push(project.clone()),
            ProjectKind::BridgeDeposit => deposits.push(project.clone()),
            ProjectKind::BridgeWithdraw => withdrawals.push(project.clone()),
            ProjectKind::Consolidation => other.push(project.clone()),
        }
    }

    swaps.shuffle(rng);
    mints.shuffle(rng);
    deposits.shuffle(rng);
    withdrawals.shuffle(rng);
    other.shuffle(rng);

    if options.randomize_single_swap {
        swaps = swaps.choose(rng).cloned().into_iter().collect();
    }
    if options.randomize_single_mint {
        mints = mints.choose(rng).cloned().into_iter().collect();
    }

    let mut ordered = swaps;
    ordered.extend(other);
    ordered.extend(mints);
    ordered.extend(deposits);
    ordered.extend(withdrawals);
    ordered
}
