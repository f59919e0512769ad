use crate::entities::subscriptions;
use crate::error::AppResult;
use crate::external::{PackageDirectory, UserDirectory};
use crate::models::{
    ListQuery, Page, SortDirection, SortField, SubscriptionListItem, SubscriptionOrder,
};
use crate::services::SubscriptionStore;
use futures_util::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Administrative read-only views over the store, enriched at the query
/// boundary with package names and usernames from the host directories.
#[derive(Clone)]
pub struct ListingService {
    store: SubscriptionStore,
    packages: Arc<dyn PackageDirectory>,
    users: Arc<dyn UserDirectory>,
}

impl ListingService {
    pub fn new(
        store: SubscriptionStore,
        packages: Arc<dyn PackageDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            store,
            packages,
            users,
        }
    }

    /// One enriched subscription, for the admin edit view.
    pub async fn get(&self, id: i64) -> AppResult<SubscriptionListItem> {
        let subscription = self.store.get(id).await?;
        let mut items = self.enrich(vec![subscription]).await?;
        Ok(items.remove(0))
    }

    /// Filterable, sortable, paginated listing.
    ///
    /// The expiry sort is pushed down to the store and fetches one page.
    /// Name sorts order by values the store does not hold, so they load the
    /// full filtered set, enrich, sort, and slice the page in memory.
    /// Tie-break in all orders: subscription id ascending.
    pub async fn list(&self, query: &ListQuery) -> AppResult<Page<SubscriptionListItem>> {
        let total = self.store.count(&query.filter).await?;

        let items = match query.sort {
            SortField::ExpiresAt => {
                let rows = self
                    .store
                    .list(
                        &query.filter,
                        SubscriptionOrder::by_expiry(query.direction),
                        &query.page,
                    )
                    .await?;
                self.enrich(rows).await?
            }
            SortField::Username | SortField::PackageName => {
                let rows = self.store.all(&query.filter).await?;
                let mut items = self.enrich(rows).await?;
                sort_by_name(&mut items, query.sort, query.direction);
                items
                    .into_iter()
                    .skip(query.page.effective_offset() as usize)
                    .take(query.page.effective_limit() as usize)
                    .collect()
            }
        };

        Ok(Page::new(items, total, &query.page))
    }

    async fn enrich(
        &self,
        rows: Vec<subscriptions::Model>,
    ) -> AppResult<Vec<SubscriptionListItem>> {
        let package_ids = distinct(rows.iter().map(|r| r.package_id));
        let user_ids = distinct(rows.iter().map(|r| r.user_id));

        let package_names =
            try_join_all(package_ids.iter().map(|id| self.packages.display_name(*id))).await?;
        let usernames = try_join_all(user_ids.iter().map(|id| self.users.username(*id))).await?;

        let package_names: HashMap<i64, Option<String>> =
            package_ids.into_iter().zip(package_names).collect();
        let usernames: HashMap<i64, Option<String>> =
            user_ids.into_iter().zip(usernames).collect();

        Ok(rows
            .into_iter()
            .map(|subscription| SubscriptionListItem {
                package_name: package_names
                    .get(&subscription.package_id)
                    .cloned()
                    .flatten(),
                username: usernames.get(&subscription.user_id).cloned().flatten(),
                subscription,
            })
            .collect())
    }
}

fn distinct(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn sort_by_name(items: &mut [SubscriptionListItem], sort: SortField, direction: SortDirection) {
    let key = |item: &SubscriptionListItem| match sort {
        SortField::Username => item.username.clone(),
        SortField::PackageName => item.package_name.clone(),
        SortField::ExpiresAt => None,
    };
    items.sort_by(|a, b| {
        let by_name = match direction {
            SortDirection::Ascending => key(a).cmp(&key(b)),
            SortDirection::Descending => key(b).cmp(&key(a)),
        };
        by_name.then_with(|| a.subscription.id.cmp(&b.subscription.id))
    });
}
