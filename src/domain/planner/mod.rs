//! Project planning - per-account ordering of configured projects

mod project_planner;

pub use project_planner::{plan, PlanOptions, Project, ProjectAction};
