use crate::error::AppResult;
use async_trait::async_trait;

/// Username lookup against the host's user table.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn username(&self, user_id: i64) -> AppResult<Option<String>>;
}
