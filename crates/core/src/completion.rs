use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::task::TaskId;
use crate::store::TaskStore;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct CompletionState {
    desired: bool,
    committed: bool,
    /// Bumped by every request; a worker holding an older value is stale.
    generation: u64,
    /// Set while a close / reopen call is outstanding.
    in_flight: bool,
    pending: Option<JoinHandle<()>>,
}

type SharedState = Arc<Mutex<HashMap<TaskId, CompletionState>>>;

/// Coalesces rapid complete / un-complete toggles per task.
///
/// Every request restarts the task's settle delay. Only the last requested
/// state reaches the store, and only when it differs from the last committed
/// state. A commit already talking to the store is never cancelled: a request
/// arriving meanwhile is picked up once that call returns, after a fresh
/// settle delay.
///
/// Entries are dropped once a task has settled, so the map only holds tasks
/// with work outstanding.
pub struct CompletionDebouncer {
    store: Arc<dyn TaskStore>,
    settle_delay: Duration,
    state: SharedState,
}

impl CompletionDebouncer {
    pub fn new(store: Arc<dyn TaskStore>, settle_delay: Duration) -> Self {
        Self { store, settle_delay, state: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Records the wanted completion state for `task_id`. Must be called
    /// from within a tokio runtime.
    pub fn request(&self, task_id: TaskId, want_completed: bool) {
        let mut state = lock(&self.state);
        let entry = state.entry(task_id.clone()).or_insert_with(|| CompletionState {
            desired: want_completed,
            committed: !want_completed,
            generation: 0,
            in_flight: false,
            pending: None,
        });
        entry.desired = want_completed;
        entry.generation += 1;

        if entry.in_flight {
            return;
        }
        if let Some(previous) = entry.pending.take() {
            previous.abort();
        }

        let worker = CommitWorker {
            store: Arc::clone(&self.store),
            shared: Arc::clone(&self.state),
            task_id,
            settle_delay: self.settle_delay,
            generation: entry.generation,
        };
        entry.pending = Some(tokio::spawn(worker.run()));
    }

    pub fn is_pending(&self, task_id: &TaskId) -> bool {
        lock(&self.state)
            .get(task_id)
            .and_then(|entry| entry.pending.as_ref())
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Tasks whose commit has not run yet; used to drain on shutdown.
    pub fn pending_count(&self) -> usize {
        lock(&self.state)
            .values()
            .filter_map(|entry| entry.pending.as_ref())
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Tasks the debouncer still holds state for.
    pub fn tracked_tasks(&self) -> usize {
        lock(&self.state).len()
    }
}

struct CommitWorker {
    store: Arc<dyn TaskStore>,
    shared: SharedState,
    task_id: TaskId,
    settle_delay: Duration,
    generation: u64,
}

impl CommitWorker {
    async fn run(mut self) {
        loop {
            tokio::time::sleep(self.settle_delay).await;

            let want_completed = {
                let mut state = lock(&self.shared);
                let Some(entry) = state.get_mut(&self.task_id) else {
                    return;
                };
                if entry.generation != self.generation {
                    return;
                }
                if entry.desired == entry.committed {
                    state.remove(&self.task_id);
                    return;
                }
                entry.in_flight = true;
                entry.desired
            };

            let result = if want_completed {
                self.store.close_task(&self.task_id).await
            } else {
                self.store.reopen_task(&self.task_id).await
            };

            let mut state = lock(&self.shared);
            let Some(entry) = state.get_mut(&self.task_id) else {
                return;
            };
            entry.in_flight = false;
            match &result {
                Ok(()) => {
                    entry.committed = want_completed;
                    info!(
                        event_name = "completion.committed",
                        task_id = %self.task_id,
                        completed = want_completed,
                        "task completion committed"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "completion.commit_failed",
                        task_id = %self.task_id,
                        completed = want_completed,
                        error = %error,
                        "failed to commit task completion"
                    );
                }
            }

            if entry.generation == self.generation {
                state.remove(&self.task_id);
                return;
            }
            // Toggled while the call was outstanding; settle again.
            self.generation = entry.generation;
        }
    }
}

fn lock(
    state: &Mutex<HashMap<TaskId, CompletionState>>,
) -> MutexGuard<'_, HashMap<TaskId, CompletionState>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
