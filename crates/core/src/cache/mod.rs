pub mod autocomplete;
pub mod labels;
pub mod tasks;

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::clock::Clock;
use crate::cooldown::CooldownGate;

pub use autocomplete::{AutocompleteCache, TaskSuggestion, MAX_SUGGESTIONS};
pub use labels::LabelCache;
pub use tasks::TaskCache;

/// Read-through cache whose refreshes are throttled by a [`CooldownGate`].
///
/// The upstream fetch runs outside every lock, so two callers granted in
/// quick succession may both fetch. A key that has never been filled is
/// always fetched, whatever the gate says.
pub struct GatedCache<K, V> {
    gate: CooldownGate<K>,
    slots: Mutex<HashMap<K, V>>,
}

impl<K, V> GatedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { gate: CooldownGate::with_clock(interval, clock), slots: Mutex::new(HashMap::new()) }
    }

    pub async fn get_or_refresh<F, Fut, E>(&self, key: &K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !self.gate.can_execute(key) {
            if let Some(cached) = self.cached(key) {
                return Ok(cached);
            }
        }

        let fresh = fetch().await?;
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).insert(key.clone(), fresh.clone());
        Ok(fresh)
    }

    pub fn cached(&self, key: &K) -> Option<V> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn interval(&self) -> Duration {
        self.gate.interval()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::GatedCache;
    use crate::clock::ManualClock;

    fn cache(seconds: u64) -> (GatedCache<String, Vec<u32>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (GatedCache::new(Duration::from_secs(seconds), clock.clone()), clock)
    }

    #[tokio::test]
    async fn serves_cached_payload_inside_the_window() {
        let (cache, clock) = cache(15);
        let counter = AtomicUsize::new(0);
        let fetches = &counter;
        let key = "U1".to_owned();

        let fetch = move || async move {
            let n = fetches.fetch_add(1, Ordering::SeqCst) as u32;
            Ok::<_, String>(vec![n])
        };

        assert_eq!(cache.get_or_refresh(&key, fetch).await, Ok(vec![0]));
        assert_eq!(cache.get_or_refresh(&key, fetch).await, Ok(vec![0]));
        clock.advance(Duration::from_secs(15));
        assert_eq!(cache.get_or_refresh(&key, fetch).await, Ok(vec![1]));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_first_fetch_is_retried_even_while_gated() {
        let (cache, _clock) = cache(60);
        let key = "U1".to_owned();

        let failed = cache.get_or_refresh(&key, || async { Err::<Vec<u32>, _>("offline") }).await;
        assert_eq!(failed, Err("offline"));
        assert!(cache.cached(&key).is_none());

        let recovered = cache.get_or_refresh(&key, || async { Ok::<_, &str>(vec![7]) }).await;
        assert_eq!(recovered, Ok(vec![7]));
    }

    #[tokio::test]
    async fn keeps_last_payload_when_later_refresh_fails() {
        let (cache, clock) = cache(5);
        let key = "U1".to_owned();

        cache.get_or_refresh(&key, || async { Ok::<_, &str>(vec![1, 2]) }).await.expect("fill");
        clock.advance(Duration::from_secs(5));
        let failed = cache.get_or_refresh(&key, || async { Err::<Vec<u32>, _>("rate limited") }).await;
        assert_eq!(failed, Err("rate limited"));

        let served = cache
            .get_or_refresh(&key, || async { Ok::<_, &str>(vec![99]) })
            .await
            .expect("served from cache");
        assert_eq!(served, vec![1, 2]);
    }

    #[tokio::test]
    async fn keys_fill_independently() {
        let (cache, _clock) = cache(60);

        cache.get_or_refresh(&"U1".to_owned(), || async { Ok::<_, ()>(vec![1]) }).await.ok();
        cache.get_or_refresh(&"U2".to_owned(), || async { Ok::<_, ()>(vec![2]) }).await.ok();

        assert_eq!(cache.cached(&"U1".to_owned()), Some(vec![1]));
        assert_eq!(cache.cached(&"U2".to_owned()), Some(vec![2]));
        assert_eq!(cache.len(), 2);
    }
}
