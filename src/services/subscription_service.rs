use crate::entities::subscriptions;
use crate::error::{AppError, AppResult};
use crate::external::{Clock, GroupMembership, PackageDirectory};
use crate::models::{SubscriptionChanges, SubscriptionRecord};
use crate::services::SubscriptionStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Enforces the create/edit/renew/cancel protocol over the store and
/// side-effects group grants at creation time.
#[derive(Clone)]
pub struct SubscriptionService {
    store: SubscriptionStore,
    groups: Arc<dyn GroupMembership>,
    packages: Arc<dyn PackageDirectory>,
    clock: Arc<dyn Clock>,
    grace_seconds: i64,
}

impl SubscriptionService {
    pub fn new(
        store: SubscriptionStore,
        groups: Arc<dyn GroupMembership>,
        packages: Arc<dyn PackageDirectory>,
        clock: Arc<dyn Clock>,
        grace_seconds: i64,
    ) -> Self {
        Self {
            store,
            groups,
            packages,
            clock,
            grace_seconds,
        }
    }

    /// Persist a new subscription, then grant the package's groups to the
    /// user. The persisted record is authoritative: a failed grant is
    /// logged and left for the host's reconciliation sweep, never rolled
    /// back.
    pub async fn create(
        &self,
        user_id: i64,
        package_id: i64,
        expires_at: i64,
    ) -> AppResult<subscriptions::Model> {
        if user_id <= 0 {
            return Err(AppError::ValidationError { field: "user_id" });
        }
        if package_id <= 0 {
            return Err(AppError::ValidationError { field: "package_id" });
        }
        self.check_expiry(expires_at)?;

        let subscription = self
            .store
            .put(SubscriptionRecord::new(user_id, package_id, expires_at))
            .await?;

        self.grant_groups(package_id, user_id).await;

        Ok(subscription)
    }

    /// Apply field-level changes to an existing subscription. Group
    /// membership is not touched; reconciliation against
    /// `entitled_user_ids` is the host's job.
    pub async fn edit(
        &self,
        id: i64,
        changes: &SubscriptionChanges,
    ) -> AppResult<subscriptions::Model> {
        let current = self.store.get(id).await?;

        if let Some(user_id) = changes.user_id
            && user_id <= 0
        {
            return Err(AppError::ValidationError { field: "user_id" });
        }
        if let Some(package_id) = changes.package_id
            && package_id <= 0
        {
            return Err(AppError::ValidationError { field: "package_id" });
        }
        // The past-expiry rule only applies to an expiry the caller set, so
        // other fields of an already lapsed subscription stay editable.
        if let Some(expires_at) = changes.expires_at {
            self.check_expiry(expires_at)?;
        }

        let mut record = SubscriptionRecord::from(current);
        changes.apply(&mut record);
        self.store.put(record).await
    }

    /// Extend the subscription by `term_seconds`, from the current expiry
    /// while it is still running, from now once it has lapsed. A
    /// never-expiring subscription is left as it is.
    pub async fn renew(&self, id: i64, term_seconds: i64) -> AppResult<subscriptions::Model> {
        if term_seconds <= 0 {
            return Err(AppError::ValidationError { field: "term_seconds" });
        }

        let current = self.store.get(id).await?;
        if current.never_expires() {
            return Ok(current);
        }

        let base = current.expires_at.max(self.clock.now_ts());
        let mut record = SubscriptionRecord::from(current);
        record.expires_at = base + term_seconds;
        self.store.put(record).await
    }

    /// Delete the subscription record. Idempotent; group membership is left
    /// to the reconciliation sweep, consistent with `edit`.
    pub async fn cancel(&self, id: i64) -> AppResult<bool> {
        self.store.delete(id).await
    }

    /// Users currently entitled to the package, under the configured grace
    /// period and the injected clock.
    pub async fn entitled_user_ids(&self, package_id: i64) -> AppResult<HashSet<i64>> {
        self.store
            .entitled_user_ids(package_id, self.clock.now_ts(), self.grace_seconds)
            .await
    }

    fn check_expiry(&self, expires_at: i64) -> AppResult<()> {
        if expires_at < 0 {
            return Err(AppError::ValidationError { field: "expires_at" });
        }
        if expires_at != 0 && expires_at < self.clock.now_ts() {
            return Err(AppError::ValidationError { field: "expires_at" });
        }
        Ok(())
    }

    async fn grant_groups(&self, package_id: i64, user_id: i64) {
        let groups = match self.packages.groups_of(package_id).await {
            Ok(groups) => groups,
            Err(e) => {
                log::warn!(
                    "Failed to resolve groups of package {package_id} for user {user_id}: {e}"
                );
                return;
            }
        };

        for group_id in groups {
            if let Err(e) = self.groups.grant(group_id, user_id).await {
                log::warn!("Failed to grant group {group_id} to user {user_id}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::FixedClock;
    use crate::models::ListFilter;
    use crate::services::testing::{setup_db, FailingGroups, FakeGroups, FakePackages};

    const NOW: i64 = 1_000_000;

    struct Fixture {
        store: SubscriptionStore,
        groups: Arc<FakeGroups>,
        service: SubscriptionService,
    }

    async fn fixture_with_grace(grace_seconds: i64) -> Fixture {
        let store = SubscriptionStore::new(setup_db().await);
        let groups = Arc::new(FakeGroups::default());
        let packages = Arc::new(FakePackages::with_package(2, "Gold", vec![10, 11]));
        let service = SubscriptionService::new(
            store.clone(),
            groups.clone(),
            packages,
            Arc::new(FixedClock(NOW)),
            grace_seconds,
        );
        Fixture {
            store,
            groups,
            service,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_grace(0).await
    }

    #[tokio::test]
    async fn test_create_persists_and_grants_groups() {
        let fx = fixture().await;

        let sub = fx.service.create(5, 2, 0).await.unwrap();
        assert!(sub.id > 0);
        assert_eq!(sub.user_id, 5);
        assert_eq!(sub.package_id, 2);
        assert_eq!(sub.expires_at, 0);

        let granted = fx.groups.granted.lock().unwrap().clone();
        assert_eq!(granted, vec![(10, 5), (11, 5)]);

        let ids = fx.service.entitled_user_ids(2).await.unwrap();
        assert!(ids.contains(&5));
    }

    #[tokio::test]
    async fn test_create_survives_grant_failure() {
        let store = SubscriptionStore::new(setup_db().await);
        let service = SubscriptionService::new(
            store.clone(),
            Arc::new(FailingGroups),
            Arc::new(FakePackages::with_package(2, "Gold", vec![10])),
            Arc::new(FixedClock(NOW)),
            0,
        );

        // grant fails, record stays authoritative
        let sub = service.create(5, 2, 0).await.unwrap();
        assert_eq!(store.get(sub.id).await.unwrap().user_id, 5);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = fixture().await;

        let err = fx.service.create(0, 2, 0).await.unwrap_err();
        assert_eq!(err.field(), Some("user_id"));

        let err = fx.service.create(5, 0, 0).await.unwrap_err();
        assert_eq!(err.field(), Some("package_id"));

        let err = fx.service.create(5, 2, -1).await.unwrap_err();
        assert_eq!(err.field(), Some("expires_at"));

        // past expiry is rejected on the add path, the sentinel is not
        let err = fx.service.create(5, 2, NOW - 1).await.unwrap_err();
        assert_eq!(err.field(), Some("expires_at"));
        fx.service.create(5, 2, 0).await.unwrap();

        // nothing but the last create reached the store
        assert_eq!(fx.store.count(&ListFilter::default()).await.unwrap(), 1);
        assert_eq!(fx.groups.granted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_duplicate_pair_is_conflict() {
        let fx = fixture().await;

        fx.service.create(5, 2, 0).await.unwrap();
        let err = fx.service.create(5, 2, NOW + 100).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict {
                package_id: 2,
                user_id: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_entitlement_honors_grace_and_expiry() {
        let fx = fixture_with_grace(86400).await;

        let sub = fx.service.create(5, 2, NOW + 3600).await.unwrap();

        // lapse it behind the service's back, as time passing would
        let mut record = SubscriptionRecord::from(sub);
        record.expires_at = NOW - 3600;
        fx.store.put(record).await.unwrap();

        // expired an hour ago but still inside the one-day grace window
        let ids = fx.service.entitled_user_ids(2).await.unwrap();
        assert!(ids.contains(&5));

        // without grace the same row is out
        let ids = fx.store.entitled_user_ids(2, NOW, 0).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_edit_changes_fields_without_regranting() {
        let fx = fixture().await;
        let sub = fx.service.create(5, 2, 0).await.unwrap();
        let grants_after_create = fx.groups.granted.lock().unwrap().len();

        let edited = fx
            .service
            .edit(
                sub.id,
                &SubscriptionChanges {
                    user_id: Some(6),
                    expires_at: Some(NOW + 3600),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.id, sub.id);
        assert_eq!(edited.user_id, 6);
        assert_eq!(edited.package_id, 2);
        assert_eq!(edited.expires_at, NOW + 3600);
        assert_eq!(fx.groups.granted.lock().unwrap().len(), grants_after_create);
    }

    #[tokio::test]
    async fn test_edit_validation() {
        let fx = fixture().await;
        let sub = fx.service.create(5, 2, 0).await.unwrap();

        let err = fx
            .service
            .edit(
                sub.id,
                &SubscriptionChanges {
                    user_id: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("user_id"));

        let err = fx
            .service
            .edit(
                sub.id,
                &SubscriptionChanges {
                    expires_at: Some(NOW - 1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("expires_at"));

        // a rejected edit applies nothing
        assert_eq!(fx.store.get(sub.id).await.unwrap().user_id, 5);
    }

    #[tokio::test]
    async fn test_edit_missing_is_hard_error() {
        let fx = fixture().await;
        let err = fx
            .service
            .edit(99, &SubscriptionChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { id: 99 }));
    }

    #[tokio::test]
    async fn test_edit_of_lapsed_subscription_keeps_old_expiry() {
        let fx = fixture().await;
        let sub = fx.service.create(5, 2, NOW + 10).await.unwrap();

        let mut record = SubscriptionRecord::from(sub.clone());
        record.expires_at = NOW - 500;
        fx.store.put(record).await.unwrap();

        // not touching the expiry of a lapsed subscription is fine
        let edited = fx
            .service
            .edit(
                sub.id,
                &SubscriptionChanges {
                    user_id: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.user_id, 7);
        assert_eq!(edited.expires_at, NOW - 500);
    }

    #[tokio::test]
    async fn test_renew_extends_running_subscription_from_expiry() {
        let fx = fixture().await;
        let sub = fx.service.create(5, 2, NOW + 100).await.unwrap();

        let renewed = fx.service.renew(sub.id, 3600).await.unwrap();
        assert_eq!(renewed.expires_at, NOW + 100 + 3600);
    }

    #[tokio::test]
    async fn test_renew_extends_lapsed_subscription_from_now() {
        let fx = fixture().await;
        let sub = fx.service.create(5, 2, NOW + 10).await.unwrap();

        let mut record = SubscriptionRecord::from(sub);
        record.expires_at = NOW - 500;
        let lapsed = fx.store.put(record).await.unwrap();

        let renewed = fx.service.renew(lapsed.id, 3600).await.unwrap();
        assert_eq!(renewed.expires_at, NOW + 3600);
    }

    #[tokio::test]
    async fn test_renew_leaves_never_expiring_alone() {
        let fx = fixture().await;
        let sub = fx.service.create(5, 2, 0).await.unwrap();

        let renewed = fx.service.renew(sub.id, 3600).await.unwrap();
        assert_eq!(renewed.expires_at, 0);
    }

    #[tokio::test]
    async fn test_renew_validation_and_missing() {
        let fx = fixture().await;
        let sub = fx.service.create(5, 2, 0).await.unwrap();

        let err = fx.service.renew(sub.id, 0).await.unwrap_err();
        assert_eq!(err.field(), Some("term_seconds"));

        let err = fx.service.renew(99, 3600).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { id: 99 }));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_keeps_groups() {
        let fx = fixture().await;
        let sub = fx.service.create(5, 2, 0).await.unwrap();

        assert!(fx.service.cancel(sub.id).await.unwrap());
        assert!(!fx.service.cancel(sub.id).await.unwrap());

        // revocation is the sweep's job, not cancel's
        assert_eq!(fx.groups.granted.lock().unwrap().clone(), vec![(10, 5), (11, 5)]);
        let ids = fx.service.entitled_user_ids(2).await.unwrap();
        assert!(ids.is_empty());
    }
}
