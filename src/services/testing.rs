//! Shared fixtures for the service tests: an in-memory database and
//! hand-rolled collaborator fakes.

use crate::config::DatabaseConfig;
use crate::database::{create_pool, run_migrations};
use crate::error::{AppError, AppResult};
use crate::external::{GroupMembership, PackageDirectory, UserDirectory};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Mutex;

/// Fresh migrated sqlite database. A single pooled connection keeps the
/// in-memory database alive for the whole test.
pub async fn setup_db() -> DatabaseConnection {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    let db = create_pool(&config).await.expect("connect sqlite");
    run_migrations(&db).await.expect("run migrations");
    db
}

#[derive(Default)]
pub struct FakeGroups {
    pub granted: Mutex<Vec<(i64, i64)>>,
    pub revoked: Mutex<Vec<(i64, i64)>>,
}

#[async_trait]
impl GroupMembership for FakeGroups {
    async fn grant(&self, group_id: i64, user_id: i64) -> AppResult<()> {
        self.granted.lock().unwrap().push((group_id, user_id));
        Ok(())
    }

    async fn revoke(&self, group_id: i64, user_id: i64) -> AppResult<()> {
        self.revoked.lock().unwrap().push((group_id, user_id));
        Ok(())
    }
}

pub struct FailingGroups;

#[async_trait]
impl GroupMembership for FailingGroups {
    async fn grant(&self, _group_id: i64, _user_id: i64) -> AppResult<()> {
        Err(AppError::ExternalApiError("group backend is down".into()))
    }

    async fn revoke(&self, _group_id: i64, _user_id: i64) -> AppResult<()> {
        Err(AppError::ExternalApiError("group backend is down".into()))
    }
}

#[derive(Default)]
pub struct FakePackages {
    groups: HashMap<i64, Vec<i64>>,
    names: HashMap<i64, String>,
}

impl FakePackages {
    pub fn with_package(package_id: i64, name: &str, groups: Vec<i64>) -> Self {
        Self::default().and_package(package_id, name, groups)
    }

    pub fn and_package(mut self, package_id: i64, name: &str, groups: Vec<i64>) -> Self {
        self.groups.insert(package_id, groups);
        self.names.insert(package_id, name.to_string());
        self
    }
}

#[async_trait]
impl PackageDirectory for FakePackages {
    async fn groups_of(&self, package_id: i64) -> AppResult<Vec<i64>> {
        Ok(self.groups.get(&package_id).cloned().unwrap_or_default())
    }

    async fn display_name(&self, package_id: i64) -> AppResult<Option<String>> {
        Ok(self.names.get(&package_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeUsers {
    names: HashMap<i64, String>,
}

impl FakeUsers {
    pub fn with_names(names: &[(i64, &str)]) -> Self {
        Self {
            names: names
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for FakeUsers {
    async fn username(&self, user_id: i64) -> AppResult<Option<String>> {
        Ok(self.names.get(&user_id).cloned())
    }
}
