use crate::entities::subscriptions::{self, Column, Entity as Subscriptions};
use crate::error::{AppError, AppResult};
use crate::models::{
    ListFilter, OrderField, PageRequest, SortDirection, SubscriptionOrder, SubscriptionRecord,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr,
};
use std::collections::HashSet;

/// Durable storage and point queries over subscription rows.
#[derive(Clone)]
pub struct SubscriptionStore {
    db: DatabaseConnection,
}

impl SubscriptionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: i64) -> AppResult<subscriptions::Model> {
        Subscriptions::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound { id })
    }

    pub async fn list(
        &self,
        filter: &ListFilter,
        order: SubscriptionOrder,
        page: &PageRequest,
    ) -> AppResult<Vec<subscriptions::Model>> {
        let query = Self::ordered(Subscriptions::find().filter(Self::condition(filter)), order);
        Ok(query
            .limit(page.effective_limit())
            .offset(page.effective_offset())
            .all(&self.db)
            .await?)
    }

    /// Full filtered set in id order, for read-time enrichment sorts.
    pub async fn all(&self, filter: &ListFilter) -> AppResult<Vec<subscriptions::Model>> {
        Ok(Subscriptions::find()
            .filter(Self::condition(filter))
            .order_by(Column::Id, Order::Asc)
            .all(&self.db)
            .await?)
    }

    pub async fn count(&self, filter: &ListFilter) -> AppResult<u64> {
        Ok(Subscriptions::find()
            .filter(Self::condition(filter))
            .count(&self.db)
            .await?)
    }

    /// Insert when the record carries no id, update otherwise. Validation
    /// happens before any write; a rejected record is never partially
    /// applied.
    pub async fn put(&self, record: SubscriptionRecord) -> AppResult<subscriptions::Model> {
        Self::validate(&record)?;

        match record.id {
            None => {
                let now = Utc::now();
                subscriptions::ActiveModel {
                    package_id: Set(record.package_id),
                    user_id: Set(record.user_id),
                    expires_at: Set(record.expires_at),
                    created_at: Set(Some(now)),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                }
                .insert(&self.db)
                .await
                .map_err(|e| Self::map_conflict(e, &record))
            }
            Some(id) => subscriptions::ActiveModel {
                id: Set(id),
                package_id: Set(record.package_id),
                user_id: Set(record.user_id),
                expires_at: Set(record.expires_at),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            }
            .update(&self.db)
            .await
            .map_err(|e| match e {
                DbErr::RecordNotUpdated => AppError::NotFound { id },
                other => Self::map_conflict(other, &record),
            }),
        }
    }

    /// Idempotent: false when no row matched.
    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let result = Subscriptions::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Users whose subscription to the package is unexpired as of `as_of`,
    /// honoring the grace period. Grace shifts the comparison instant
    /// backward instead of adjusting stored rows, so a grace change is
    /// retroactive.
    pub async fn entitled_user_ids(
        &self,
        package_id: i64,
        as_of: i64,
        grace_seconds: i64,
    ) -> AppResult<HashSet<i64>> {
        let cutoff = as_of - grace_seconds;
        let ids: Vec<i64> = Subscriptions::find()
            .select_only()
            .column(Column::UserId)
            .filter(Column::PackageId.eq(package_id))
            .filter(
                Condition::any()
                    .add(Column::ExpiresAt.eq(0))
                    .add(Column::ExpiresAt.gt(cutoff)),
            )
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(ids.into_iter().collect())
    }

    fn condition(filter: &ListFilter) -> Condition {
        Condition::all()
            .add_option(filter.user_id.map(|id| Column::UserId.eq(id)))
            .add_option(filter.package_id.map(|id| Column::PackageId.eq(id)))
    }

    fn ordered(
        query: Select<Subscriptions>,
        order: SubscriptionOrder,
    ) -> Select<Subscriptions> {
        let direction = match order.direction {
            SortDirection::Ascending => Order::Asc,
            SortDirection::Descending => Order::Desc,
        };
        match order.field {
            OrderField::Id => query.order_by(Column::Id, direction),
            // The never-expires sentinel (0) sorts as +infinity: last under
            // ascending, first under descending.
            OrderField::ExpiresAt => query
                .order_by(Expr::col(Column::ExpiresAt).eq(0), direction.clone())
                .order_by(Column::ExpiresAt, direction)
                .order_by(Column::Id, Order::Asc),
        }
    }

    fn validate(record: &SubscriptionRecord) -> AppResult<()> {
        if record.user_id <= 0 {
            return Err(AppError::ValidationError { field: "user_id" });
        }
        if record.package_id < 0 {
            return Err(AppError::ValidationError { field: "package_id" });
        }
        if record.expires_at < 0 {
            return Err(AppError::ValidationError { field: "expires_at" });
        }
        Ok(())
    }

    fn map_conflict(err: DbErr, record: &SubscriptionRecord) -> AppError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict {
                package_id: record.package_id,
                user_id: record.user_id,
            },
            _ => err.into(),
        }
    }
}
