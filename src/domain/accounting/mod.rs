//! Accounting/authorization service port

use async_trait::async_trait;

use crate::shared::errors::ApiError;
use crate::shared::types::{AccountIdentity, ActionKind, AuthorizationTicket, UserInfo};

/// Point-accounting service that must authorize every on-chain action.
/// A granted ticket is consumed exactly once: committed implicitly by a
/// successful action, or refunded through `cancel_action`.
#[async_trait]
pub trait AccountingApi: Send + Sync {
    /// Request authorization and a refundable credit for one action
    async fn new_action(
        &self,
        action: ActionKind,
        identity: &AccountIdentity,
    ) -> Result<AuthorizationTicket, ApiError>;

    /// Refund a previously granted ticket
    async fn cancel_action(&self, ticket: &AuthorizationTicket) -> Result<(), ApiError>;

    /// Current user record (pre-run credit check)
    async fn user_info(&self) -> Result<UserInfo, ApiError>;
}
