//! Drover - multi-wallet L2 trading bot
//! Built with Domain-Driven Design principles

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use domain::amount::AmountBounds;
pub use domain::planner::{plan, PlanOptions, Project};
pub use domain::trader::{ControlHandle, EngineSettings, RunReport, TraderEngine};
