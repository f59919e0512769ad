use crate::entities::subscriptions;
use crate::models::PageRequest;
use serde::{Deserialize, Serialize};

/// A subscription as handed to [`put`](crate::services::SubscriptionStore::put):
/// no id means insert, an id means update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Option<i64>,
    pub package_id: i64,
    pub user_id: i64,
    pub expires_at: i64,
}

impl SubscriptionRecord {
    pub fn new(user_id: i64, package_id: i64, expires_at: i64) -> Self {
        Self {
            id: None,
            package_id,
            user_id,
            expires_at,
        }
    }
}

impl From<subscriptions::Model> for SubscriptionRecord {
    fn from(model: subscriptions::Model) -> Self {
        Self {
            id: Some(model.id),
            package_id: model.package_id,
            user_id: model.user_id,
            expires_at: model.expires_at,
        }
    }
}

/// Field-level changes for an administrative edit. Unset fields are left
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionChanges {
    pub package_id: Option<i64>,
    pub user_id: Option<i64>,
    pub expires_at: Option<i64>,
}

impl SubscriptionChanges {
    pub fn apply(&self, record: &mut SubscriptionRecord) {
        if let Some(package_id) = self.package_id {
            record.package_id = package_id;
        }
        if let Some(user_id) = self.user_id {
            record.user_id = user_id;
        }
        if let Some(expires_at) = self.expires_at {
            record.expires_at = expires_at;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.package_id.is_none() && self.user_id.is_none() && self.expires_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ListFilter {
    pub user_id: Option<i64>,
    pub package_id: Option<i64>,
}

impl ListFilter {
    pub fn by_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn by_package(package_id: i64) -> Self {
        Self {
            package_id: Some(package_id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort keys for the administrative listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Username,
    PackageName,
    ExpiresAt,
}

/// Store-level orderings; these only cover columns the store itself owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Id,
    /// Orders the never-expires sentinel (0) as if it were +infinity.
    ExpiresAt,
}

#[derive(Debug, Clone, Copy)]
pub struct SubscriptionOrder {
    pub field: OrderField,
    pub direction: SortDirection,
}

impl SubscriptionOrder {
    pub fn by_id() -> Self {
        Self {
            field: OrderField::Id,
            direction: SortDirection::Ascending,
        }
    }

    pub fn by_expiry(direction: SortDirection) -> Self {
        Self {
            field: OrderField::ExpiresAt,
            direction,
        }
    }
}

/// Parameters of an administrative listing request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: ListFilter,
    #[serde(default)]
    pub sort: SortField,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub page: PageRequest,
}

/// One row of the admin listing: the subscription plus read-time lookups
/// of the package and user display names.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionListItem {
    pub subscription: subscriptions::Model,
    pub package_name: Option<String>,
    pub username: Option<String>,
}
