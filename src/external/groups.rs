use crate::error::AppResult;
use async_trait::async_trait;

/// Host-side group membership management.
///
/// `grant` is called when a subscription is created. `revoke` is never
/// called by this crate; revocation belongs to the host's periodic
/// reconciliation sweep against `entitled_user_ids`.
#[async_trait]
pub trait GroupMembership: Send + Sync {
    async fn grant(&self, group_id: i64, user_id: i64) -> AppResult<()>;

    async fn revoke(&self, group_id: i64, user_id: i64) -> AppResult<()>;
}
