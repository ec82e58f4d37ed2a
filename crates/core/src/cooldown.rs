use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

/// Per-key time-window gate.
///
/// A key is granted at most once per `interval`. The grant is recorded at the
/// moment it is handed out; a denied call never touches state.
pub struct CooldownGate<K> {
    interval: Duration,
    clock: Arc<dyn Clock>,
    last_permitted: Mutex<HashMap<K, Instant>>,
}

impl<K> CooldownGate<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, Arc::new(SystemClock))
    }

    pub fn with_clock(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { interval, clock, last_permitted: Mutex::new(HashMap::new()) }
    }

    pub fn can_execute(&self, key: &K) -> bool {
        let now = self.clock.now();
        let mut last_permitted = self.last_permitted.lock().unwrap_or_else(PoisonError::into_inner);

        let permitted = match last_permitted.get(key) {
            Some(previous) => now.saturating_duration_since(*previous) >= self.interval,
            None => true,
        };
        if permitted {
            last_permitted.insert(key.clone(), now);
        }
        permitted
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of distinct keys seen so far. Keys are never evicted.
    pub fn tracked_keys(&self) -> usize {
        self.last_permitted.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
