use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::{NewTask, TaskStore, TaskStoreError, TaskUpdate};
use crate::domain::{
    label::Label,
    project::Project,
    task::{Due, Task, TaskId},
};

/// Process-local task store. Mirrors the remote service closely enough for
/// fixtures and offline runs: listings only return open tasks, ids are
/// sequential, and every call is recorded by operation name.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Task>,
    labels: Vec<Label>,
    projects: Vec<Project>,
    next_id: u64,
    calls: Vec<&'static str>,
    fail_next: Option<TaskStoreError>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixtures(tasks: Vec<Task>, labels: Vec<Label>, projects: Vec<Project>) -> Self {
        Self {
            state: Mutex::new(MemoryState { tasks, labels, projects, ..MemoryState::default() }),
        }
    }

    /// Makes the next call of any kind fail with `error`.
    pub fn fail_next(&self, error: TaskStoreError) {
        self.lock().fail_next = Some(error);
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|call| **call == operation).count()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn snapshot(&self, id: &TaskId) -> Option<Task> {
        self.lock().tasks.iter().find(|task| &task.id == id).cloned()
    }

    pub fn replace_labels(&self, labels: Vec<Label>) {
        self.lock().labels = labels;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, operation: &'static str) -> Result<MutexGuard<'_, MemoryState>, TaskStoreError> {
        let mut state = self.lock();
        state.calls.push(operation);
        let failure = state.fail_next.take();
        match failure {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

impl MemoryState {
    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task, TaskStoreError> {
        self.tasks
            .iter_mut()
            .find(|task| &task.id == id)
            .ok_or_else(|| TaskStoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn list_tasks(&self) -> Result<Vec<Task>, TaskStoreError> {
        let state = self.begin("list_tasks")?;
        Ok(state.tasks.iter().filter(|task| !task.is_completed).cloned().collect())
    }

    async fn list_tasks_with_label(&self, label: &str) -> Result<Vec<Task>, TaskStoreError> {
        let state = self.begin("list_tasks_with_label")?;
        Ok(state
            .tasks
            .iter()
            .filter(|task| !task.is_completed && task.labels.iter().any(|name| name == label))
            .cloned()
            .collect())
    }

    async fn list_labels(&self) -> Result<Vec<Label>, TaskStoreError> {
        let state = self.begin("list_labels")?;
        Ok(state.labels.clone())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, TaskStoreError> {
        let state = self.begin("list_projects")?;
        Ok(state.projects.clone())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, TaskStoreError> {
        let mut state = self.begin("get_task")?;
        state.task_mut(id).map(|task| task.clone())
    }

    async fn add_task(&self, task: NewTask) -> Result<Task, TaskStoreError> {
        let mut state = self.begin("add_task")?;
        state.next_id += 1;
        let id = TaskId(format!("{}", 1000 + state.next_id));
        let created = Task {
            url: format!("https://app.todoist.com/app/task/{id}"),
            id,
            content: task.content,
            description: String::new(),
            due: None,
            priority: Default::default(),
            parent_id: task.parent_id,
            project_id: None,
            section_id: None,
            labels: Vec::new(),
            is_completed: false,
            created_at: Utc::now(),
        };
        state.tasks.push(created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: &TaskId, update: TaskUpdate) -> Result<Task, TaskStoreError> {
        let mut state = self.begin("update_task")?;
        let task = state.task_mut(id)?;
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(due_string) = update.due_string {
            task.due = if due_string.eq_ignore_ascii_case("no due date") {
                None
            } else {
                Some(Due { string: due_string, ..Due::default() })
            };
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(labels) = update.labels {
            task.labels = labels;
        }
        Ok(task.clone())
    }

    async fn close_task(&self, id: &TaskId) -> Result<(), TaskStoreError> {
        let mut state = self.begin("close_task")?;
        state.task_mut(id)?.is_completed = true;
        Ok(())
    }

    async fn reopen_task(&self, id: &TaskId) -> Result<(), TaskStoreError> {
        let mut state = self.begin("reopen_task")?;
        state.task_mut(id)?.is_completed = false;
        Ok(())
    }
}
