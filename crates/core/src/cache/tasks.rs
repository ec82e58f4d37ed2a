use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::GatedCache;
use crate::clock::Clock;
use crate::domain::task::Task;
use crate::store::{TaskStore, TaskStoreError};

/// Process-wide task list shared by every user.
pub struct TaskCache {
    store: Arc<dyn TaskStore>,
    cache: GatedCache<(), Arc<Vec<Task>>>,
}

impl TaskCache {
    pub fn new(store: Arc<dyn TaskStore>, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, cache: GatedCache::new(interval, clock) }
    }

    pub async fn get_tasks(&self) -> Result<Arc<Vec<Task>>, TaskStoreError> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_refresh(&(), || async move {
                debug!(event_name = "cache.tasks.refresh", "refreshing shared task list");
                store.list_tasks().await.map(Arc::new)
            })
            .await
    }

    pub fn is_filled(&self) -> bool {
        !self.cache.is_empty()
    }
}
