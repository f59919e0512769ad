use crate::error::AppResult;
use async_trait::async_trait;

/// Read-only lookup of package definitions held by the host.
///
/// A package is opaque to this crate beyond the groups it grants and its
/// display name.
#[async_trait]
pub trait PackageDirectory: Send + Sync {
    /// The group ids granted by the package.
    async fn groups_of(&self, package_id: i64) -> AppResult<Vec<i64>>;

    /// Display name of the package, if the id is known.
    async fn display_name(&self, package_id: i64) -> AppResult<Option<String>>;
}
