use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::GatedCache;
use crate::clock::Clock;
use crate::domain::label::Label;
use crate::store::{TaskStore, TaskStoreError};

/// Account label set, gated per requesting user so one user's refresh never
/// waits on another's window.
pub struct LabelCache {
    store: Arc<dyn TaskStore>,
    cache: GatedCache<String, Arc<Vec<Label>>>,
}

impl LabelCache {
    pub fn new(store: Arc<dyn TaskStore>, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, cache: GatedCache::new(interval, clock) }
    }

    pub async fn get_labels(&self, user_id: &str) -> Result<Arc<Vec<Label>>, TaskStoreError> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_refresh(&user_id.to_owned(), || async move {
                debug!(event_name = "cache.labels.refresh", user_id, "refreshing label set");
                store.list_labels().await.map(Arc::new)
            })
            .await
    }

    pub fn cached_users(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::LabelCache;
    use crate::clock::ManualClock;
    use crate::domain::label::{Label, LabelColor};
    use crate::store::{InMemoryTaskStore, TaskStoreError};

    fn label(name: &str) -> Label {
        Label {
            id: name.to_owned(),
            name: name.to_owned(),
            color: LabelColor::Blue,
            is_favorite: false,
        }
    }

    #[tokio::test]
    async fn serves_last_fetched_labels_while_gated() {
        let store = Arc::new(InMemoryTaskStore::with_fixtures(
            Vec::new(),
            vec![label("home")],
            Vec::new(),
        ));
        let clock = Arc::new(ManualClock::new());
        let cache = LabelCache::new(store.clone(), Duration::from_secs(60), clock.clone());

        assert_eq!(cache.get_labels("U1").await.expect("fill").len(), 1);

        store.replace_labels(vec![label("home"), label("work")]);
        assert_eq!(cache.get_labels("U1").await.expect("cached").len(), 1);
        assert_eq!(store.call_count("list_labels"), 1);

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get_labels("U1").await.expect("refreshed").len(), 2);
    }

    #[tokio::test]
    async fn refresh_failure_after_fill_keeps_serving_last_labels() {
        let store = Arc::new(InMemoryTaskStore::with_fixtures(
            Vec::new(),
            vec![label("home")],
            Vec::new(),
        ));
        let clock = Arc::new(ManualClock::new());
        let cache = LabelCache::new(store.clone(), Duration::from_secs(60), clock.clone());
        cache.get_labels("U1").await.expect("fill");

        clock.advance(Duration::from_secs(61));
        store.fail_next(TaskStoreError::Http { status: 429, body: "slow down".to_owned() });
        assert!(cache.get_labels("U1").await.is_err());

        let labels = cache.get_labels("U1").await.expect("cached after failure");
        assert_eq!(labels.len(), 1);
        assert_eq!(store.call_count("list_labels"), 2);
    }
}
