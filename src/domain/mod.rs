//! Domain layer - orchestration core and ports to external collaborators

pub mod accounting;
pub mod adapters;
pub mod amount;
pub mod chain;
pub mod oracles;
pub mod planner;
pub mod trader;
