pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    label::Label,
    project::Project,
    task::{Priority, Task, TaskId},
};

pub use memory::InMemoryTaskStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TaskStoreError {
    #[error("task store request failed: {0}")]
    Network(String),
    #[error("task store returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("task store payload could not be decoded: {0}")]
    Decode(String),
    #[error("task `{0}` was not found")]
    NotFound(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
}

impl NewTask {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), parent_id: None }
    }

    pub fn child_of(mut self, parent_id: TaskId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Partial update; `None` fields are left untouched remotely.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, TaskStoreError>;
    async fn list_tasks_with_label(&self, label: &str) -> Result<Vec<Task>, TaskStoreError>;
    async fn list_labels(&self) -> Result<Vec<Label>, TaskStoreError>;
    async fn list_projects(&self) -> Result<Vec<Project>, TaskStoreError>;
    async fn get_task(&self, id: &TaskId) -> Result<Task, TaskStoreError>;
    async fn add_task(&self, task: NewTask) -> Result<Task, TaskStoreError>;
    async fn update_task(&self, id: &TaskId, update: TaskUpdate) -> Result<Task, TaskStoreError>;
    async fn close_task(&self, id: &TaskId) -> Result<(), TaskStoreError>;
    async fn reopen_task(&self, id: &TaskId) -> Result<(), TaskStoreError>;
}

/// How the caller wants a single task located.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskLookup {
    ById(TaskId),
    ByLabel(String),
}

/// Resolves a lookup to at most one task. A missing id and a label with no
/// tasks both resolve to `None`; every other failure propagates.
pub async fn resolve_task(
    store: &dyn TaskStore,
    lookup: &TaskLookup,
) -> Result<Option<Task>, TaskStoreError> {
    match lookup {
        TaskLookup::ById(id) => match store.get_task(id).await {
            Ok(task) => Ok(Some(task)),
            Err(TaskStoreError::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        },
        TaskLookup::ByLabel(label) => {
            Ok(store.list_tasks_with_label(label).await?.into_iter().next())
        }
    }
}
