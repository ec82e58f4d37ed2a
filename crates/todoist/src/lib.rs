//! Todoist REST v2 implementation of [`TaskStore`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use taskbot_core::config::TodoistConfig;
use taskbot_core::store::{NewTask, TaskStore, TaskStoreError, TaskUpdate};
use taskbot_core::{Label, Project, Task, TaskId};

const REQUEST_ID_HEADER: &str = "X-Request-Id";
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum TodoistClientError {
    #[error("invalid todoist base url `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct TodoistClient {
    http: Client,
    base_url: Url,
    token: SecretString,
}

impl TodoistClient {
    pub fn new(
        base_url: &str,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, TodoistClientError> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, token })
    }

    pub fn from_config(config: &TodoistConfig) -> Result<Self, TodoistClientError> {
        Self::new(
            &config.base_url,
            config.api_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TaskStoreError> {
        endpoint_url(&self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.token.expose_secret())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TaskStoreError> {
        let url = self.endpoint(path)?;
        debug!(event_name = "todoist.request", method = "GET", path, "calling task service");
        let request = self.authorized(self.http.get(url)).query(query);
        let body = send(request, path).await?;
        decode(&body)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<T, TaskStoreError> {
        let body = self.post(path, Some(payload)).await?;
        decode(&body)
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        payload: Option<&B>,
    ) -> Result<String, TaskStoreError> {
        let url = self.endpoint(path)?;
        let request_id = Uuid::new_v4().to_string();
        debug!(
            event_name = "todoist.request",
            method = "POST",
            path,
            request_id = %request_id,
            "calling task service"
        );

        let mut request =
            self.authorized(self.http.post(url)).header(REQUEST_ID_HEADER, request_id);
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        send(request, path).await
    }
}

async fn send(request: RequestBuilder, path: &str) -> Result<String, TaskStoreError> {
    let response = request.send().await.map_err(|error| {
        warn!(
            event_name = "todoist.transport_failed",
            path,
            error = %error,
            "task service unreachable"
        );
        TaskStoreError::Network(error.to_string())
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|error| TaskStoreError::Network(error.to_string()))?;

    if status.is_success() {
        return Ok(body);
    }

    warn!(
        event_name = "todoist.http_error",
        path,
        status = status.as_u16(),
        "task service rejected request"
    );
    Err(status_error(status, path, &body))
}

#[async_trait]
impl TaskStore for TodoistClient {
    async fn list_tasks(&self) -> Result<Vec<Task>, TaskStoreError> {
        self.get_json("tasks", &[]).await
    }

    async fn list_tasks_with_label(&self, label: &str) -> Result<Vec<Task>, TaskStoreError> {
        self.get_json("tasks", &[("label", label)]).await
    }

    async fn list_labels(&self) -> Result<Vec<Label>, TaskStoreError> {
        self.get_json("labels", &[]).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, TaskStoreError> {
        self.get_json("projects", &[]).await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, TaskStoreError> {
        self.get_json(&task_path(id, None), &[]).await
    }

    async fn add_task(&self, task: NewTask) -> Result<Task, TaskStoreError> {
        self.post_json("tasks", &task).await
    }

    async fn update_task(&self, id: &TaskId, update: TaskUpdate) -> Result<Task, TaskStoreError> {
        self.post_json(&task_path(id, None), &update).await
    }

    async fn close_task(&self, id: &TaskId) -> Result<(), TaskStoreError> {
        self.post::<()>(&task_path(id, Some("close")), None).await.map(|_| ())
    }

    async fn reopen_task(&self, id: &TaskId) -> Result<(), TaskStoreError> {
        self.post::<()>(&task_path(id, Some("reopen")), None).await.map(|_| ())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, TodoistClientError> {
    let trimmed = raw.trim();
    let normalized =
        if trimmed.ends_with('/') { trimmed.to_owned() } else { format!("{trimmed}/") };
    let url = Url::parse(&normalized).map_err(|error| TodoistClientError::InvalidBaseUrl {
        url: raw.to_owned(),
        reason: error.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(TodoistClientError::InvalidBaseUrl {
            url: raw.to_owned(),
            reason: "url cannot be used as a base".to_owned(),
        });
    }
    Ok(url)
}

fn endpoint_url(base: &Url, path: &str) -> Result<Url, TaskStoreError> {
    base.join(path)
        .map_err(|error| TaskStoreError::Network(format!("invalid endpoint `{path}`: {error}")))
}

fn task_path(id: &TaskId, action: Option<&str>) -> String {
    let escaped: String = id
        .as_str()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        .collect();
    match action {
        Some(action) => format!("tasks/{escaped}/{action}"),
        None => format!("tasks/{escaped}"),
    }
}

fn status_error(status: StatusCode, path: &str, body: &str) -> TaskStoreError {
    if status == StatusCode::NOT_FOUND {
        let resource = path
            .strip_prefix("tasks/")
            .and_then(|rest| rest.split('/').next())
            .unwrap_or(path);
        return TaskStoreError::NotFound(resource.to_owned());
    }

    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    TaskStoreError::Http { status: status.as_u16(), body }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, TaskStoreError> {
    serde_json::from_str(body).map_err(|error| TaskStoreError::Decode(error.to_string()))
}
