//! Process-wide run flags shared between the worker and its controller

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

/// Pause/stop flags plus the success counter. Owned by the engine and
/// mutated from outside only through a `ControlHandle`. Suspension and
/// cancellation are cooperative: the worker observes the flags at
/// checkpoints, never mid-operation.
#[derive(Debug, Default)]
pub struct ExecutionState {
    paused: AtomicBool,
    stopped: AtomicBool,
    success_count: AtomicU32,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh run: clear both flags and the counter
    pub fn reset(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn record_success(&self) {
        self.success_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn successes(&self) -> u32 {
        self.success_count.load(Ordering::SeqCst)
    }

    /// Checkpoint: block while paused, abort on stop.
    /// Returns `false` when the run should unwind.
    pub async fn checkpoint(&self) -> bool {
        loop {
            if self.is_stopped() {
                return false;
            }
            if !self.is_paused() {
                return true;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    /// Cancellable wait with one-second granularity.
    /// Returns `false` when stopped during (or right after) the wait.
    pub async fn sleep_interruptible(&self, duration: Duration) -> bool {
        let mut remaining = duration.as_secs();
        while remaining > 0 {
            if self.is_stopped() {
                return false;
            }
            sleep(Duration::from_secs(1)).await;
            remaining -= 1;
        }
        !self.is_stopped()
    }

    fn set_paused(&self, value: bool) {
        self.paused.store(value, Ordering::SeqCst);
    }

    fn set_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Cloneable controller surface over the engine's execution state
#[derive(Debug, Clone)]
pub struct ControlHandle {
    state: Arc<ExecutionState>,
}

impl ControlHandle {
    pub fn new(state: Arc<ExecutionState>) -> Self {
        Self { state }
    }

    pub fn pause(&self) {
        self.state.set_paused(true);
    }

    pub fn resume(&self) {
        self.state.set_paused(false);
    }

    pub fn stop(&self) {
        self.state.set_stopped();
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }
}
