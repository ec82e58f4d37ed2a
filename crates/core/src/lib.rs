pub mod cache;
pub mod clock;
pub mod completion;
pub mod config;
pub mod cooldown;
pub mod domain;
pub mod errors;
pub mod render;
pub mod store;
pub mod subtasks;

pub use cache::{AutocompleteCache, GatedCache, LabelCache, TaskCache, TaskSuggestion};
pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::CompletionDebouncer;
pub use cooldown::CooldownGate;
pub use domain::label::{Label, LabelColor};
pub use domain::project::Project;
pub use domain::task::{Due, Priority, Task, TaskId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use render::{DocumentSection, TaskDocument, TaskInfoRenderer};
pub use store::{
    resolve_task, InMemoryTaskStore, NewTask, TaskLookup, TaskStore, TaskStoreError, TaskUpdate,
};
pub use subtasks::{
    ancestor_depth, build_subtask_tree, SubtaskIndex, SubtaskTree, MAX_SUBTASK_DEPTH,
};
