use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::GatedCache;
use crate::clock::Clock;
use crate::domain::task::{Task, TaskId};
use crate::store::{TaskStore, TaskStoreError};

/// Upper bound imposed by Slack on options returned to a select menu.
pub const MAX_SUGGESTIONS: usize = 25;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSuggestion {
    pub task_id: TaskId,
    pub content: String,
}

/// Per-user cache of the raw task list behind fast-typing suggestions.
pub struct AutocompleteCache {
    store: Arc<dyn TaskStore>,
    cache: GatedCache<String, Arc<Vec<Task>>>,
}

impl AutocompleteCache {
    pub fn new(store: Arc<dyn TaskStore>, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, cache: GatedCache::new(interval, clock) }
    }

    pub async fn tasks(&self, user_id: &str) -> Result<Arc<Vec<Task>>, TaskStoreError> {
        let store = Arc::clone(&self.store);
        self.cache
            .get_or_refresh(&user_id.to_owned(), || async move {
                debug!(event_name = "cache.autocomplete.refresh", user_id, "refreshing task list");
                store.list_tasks().await.map(Arc::new)
            })
            .await
    }

    pub async fn suggest(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<Vec<TaskSuggestion>, TaskStoreError> {
        let tasks = self.tasks(user_id).await?;
        Ok(filter_by_prefix(&tasks, query))
    }

    pub fn cached_users(&self) -> usize {
        self.cache.len()
    }
}

/// Case-insensitive prefix match on task content, in list order, capped at
/// [`MAX_SUGGESTIONS`].
pub fn filter_by_prefix(tasks: &[Task], query: &str) -> Vec<TaskSuggestion> {
    let needle = query.to_lowercase();
    tasks
        .iter()
        .filter(|task| task.content.to_lowercase().starts_with(&needle))
        .take(MAX_SUGGESTIONS)
        .map(|task| TaskSuggestion { task_id: task.id.clone(), content: task.content.clone() })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::{filter_by_prefix, AutocompleteCache, MAX_SUGGESTIONS};
    use crate::clock::ManualClock;
    use crate::domain::task::{Task, TaskId};
    use crate::store::{InMemoryTaskStore, NewTask, TaskStore};

    fn task(id: &str, content: &str) -> Task {
        Task {
            id: TaskId::from(id),
            content: content.to_owned(),
            description: String::new(),
            due: None,
            priority: Default::default(),
            parent_id: None,
            project_id: None,
            section_id: None,
            labels: Vec::new(),
            is_completed: false,
            created_at: Utc::now(),
            url: String::new(),
        }
    }

    #[test]
    fn prefix_filter_is_case_insensitive_and_keeps_order() {
        let tasks = vec![task("1", "Buy milk"), task("2", "buy bread"), task("3", "Call mom")];

        let matches: Vec<String> =
            filter_by_prefix(&tasks, "buy").into_iter().map(|suggestion| suggestion.content).collect();

        assert_eq!(matches, vec!["Buy milk".to_owned(), "buy bread".to_owned()]);
    }

    #[test]
    fn prefix_filter_caps_results() {
        let tasks: Vec<Task> =
            (0..40).map(|index| task(&index.to_string(), &format!("Task {index}"))).collect();

        let matches = filter_by_prefix(&tasks, "task");
        assert_eq!(matches.len(), MAX_SUGGESTIONS);
        assert_eq!(matches[0].task_id, TaskId::from("0"));
        assert_eq!(matches[24].task_id, TaskId::from("24"));
    }

    #[test]
    fn empty_query_matches_everything() {
        let tasks = vec![task("1", "Buy milk"), task("2", "Call mom")];
        assert_eq!(filter_by_prefix(&tasks, "").len(), 2);
    }

    #[tokio::test]
    async fn repeated_suggestions_reuse_the_cached_list_per_user() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.add_task(NewTask::new("Buy milk")).await.expect("add");
        let clock = Arc::new(ManualClock::new());
        let cache = AutocompleteCache::new(store.clone(), Duration::from_secs(15), clock.clone());

        cache.suggest("U1", "b").await.expect("first");
        cache.suggest("U1", "bu").await.expect("second");
        cache.suggest("U2", "b").await.expect("other user");
        assert_eq!(store.call_count("list_tasks"), 2);

        store.add_task(NewTask::new("Buy bread")).await.expect("add");
        let stale = cache.suggest("U1", "buy").await.expect("stale");
        assert_eq!(stale.len(), 1);

        clock.advance(Duration::from_secs(15));
        let fresh = cache.suggest("U1", "buy").await.expect("fresh");
        assert_eq!(fresh.len(), 2);
        assert_eq!(store.call_count("list_tasks"), 3);
        assert_eq!(cache.cached_users(), 2);
    }
}
