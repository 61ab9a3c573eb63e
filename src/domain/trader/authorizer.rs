//! Authorize/execute/refund wrapper around every risky on-chain action

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

use crate::domain::accounting::AccountingApi;
use crate::domain::trader::ExecutionState;
use crate::shared::errors::TradeError;
use crate::shared::types::{AccountIdentity, ActionKind, AuthorizationTicket};

const AUTH_RETRY_SECS: u64 = 60;
const MAX_OPERATION_ATTEMPTS: u32 = 5;
const TRANSIENT_BACKOFF_SECS: (u64, u64) = (50, 90);

/// Result of an authorized operation. `Stopped` is a silent unwind,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome<T> {
    Completed(T),
    Stopped,
}

enum Attempt<T> {
    Done(T),
    Failed(TradeError),
    Interrupted,
}

/// Wraps one authorized operation: requests a ticket from the
/// accounting service before execution and issues a compensating refund
/// if the wrapped operation fails. Authorization failures retry
/// indefinitely (fixed backoff) until stopped; transient chain errors
/// retry the operation alone, bounded.
pub struct ActionAuthorizer {
    api: Arc<dyn AccountingApi>,
    state: Arc<ExecutionState>,
}

impl ActionAuthorizer {
    pub fn new(api: Arc<dyn AccountingApi>, state: Arc<ExecutionState>) -> Self {
        Self { api, state }
    }

    pub async fn authorize_and_run<T, F, Fut>(
        &self,
        action: ActionKind,
        identity: &AccountIdentity,
        operation: F,
    ) -> Result<AuthOutcome<T>, TradeError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TradeError>>,
    {
        loop {
            if !self.state.checkpoint().await {
                return Ok(AuthOutcome::Stopped);
            }
            let ticket = match self.api.new_action(action, identity).await {
                Ok(ticket) => ticket,
                Err(err) => {
                    error!("API error: {}", err);
                    error!("Retry in {} sec.", AUTH_RETRY_SECS);
                    if !self
                        .state
                        .sleep_interruptible(Duration::from_secs(AUTH_RETRY_SECS))
                        .await
                    {
                        return Ok(AuthOutcome::Stopped);
                    }
                    continue;
                }
            };
            if ticket.whitelisted {
                info!("Wallet is in the WL");
            } else {
                info!("Wallet is NOT in the WL");
            }

            return match self.run_with_retries(&operation).await {
                Attempt::Done(value) => Ok(AuthOutcome::Completed(value)),
                Attempt::Failed(err) => {
                    error!("{}", err);
                    self.refund(&ticket).await;
                    Err(err)
                }
                Attempt::Interrupted => {
                    self.refund(&ticket).await;
                    Ok(AuthOutcome::Stopped)
                }
            };
        }
    }

    /// Run the operation, retrying transient chain errors a bounded
    /// number of times with a randomized backoff. Never resubmits a
    /// broadcast transaction: each attempt re-derives its parameters
    /// inside the operation closure.
    async fn run_with_retries<T, F, Fut>(&self, operation: &F) -> Attempt<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TradeError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Attempt::Done(value),
                Err(err) if err.is_transient() && attempt < MAX_OPERATION_ATTEMPTS => {
                    let backoff = {
                        let mut rng = rand::thread_rng();
                        rng.gen_range(TRANSIENT_BACKOFF_SECS.0..=TRANSIENT_BACKOFF_SECS.1)
                    };
                    warn!(
                        "{} (attempt {}/{}), retry in {} sec.",
                        err, attempt, MAX_OPERATION_ATTEMPTS, backoff
                    );
                    if !self
                        .state
                        .sleep_interruptible(Duration::from_secs(backoff))
                        .await
                    {
                        return Attempt::Interrupted;
                    }
                    attempt += 1;
                }
                Err(err) => return Attempt::Failed(err),
            }
        }
    }

    /// Refund is requested at most once per granted ticket; a failed
    /// refund only logs, the engine moves on either way.
    async fn refund(&self, ticket: &AuthorizationTicket) {
        info!("Points refunding for an unsuccessful action...");
        if let Err(err) = self.api.cancel_action(ticket).await {
            warn!("Refund request failed: {}", err);
        }
    }
}
