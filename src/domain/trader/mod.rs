//! Trading engine - the state machine driving accounts through projects

mod authorizer;
mod engine;
mod execution_state;
mod gas_gate;

pub use authorizer::{ActionAuthorizer, AuthOutcome};
pub use engine::{EngineSettings, RunReport, TraderEngine};
pub use execution_state::{ControlHandle, ExecutionState};
pub use gas_gate::{GasGate, GateOutcome};
