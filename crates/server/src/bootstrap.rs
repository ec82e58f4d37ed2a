use std::sync::Arc;

use taskbot_core::config::{AppConfig, ConfigError, LoadOptions};
use taskbot_core::{SystemClock, TaskStore};
use taskbot_slack::events::task_dispatcher;
use taskbot_slack::socket::SocketModeRunner;
use taskbot_slack::TaskBotService;
use taskbot_todoist::{TodoistClient, TodoistClientError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub service: Arc<TaskBotService>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("task store client could not be created: {0}")]
    TaskStore(#[from] TodoistClientError),
}

#[cfg_attr(not(test), allow(dead_code))]
pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let client = TodoistClient::from_config(&config.todoist)?;
    info!(
        event_name = "system.bootstrap.task_store_ready",
        correlation_id = "bootstrap",
        base_url = %client.base_url(),
        "task store client configured"
    );

    let store: Arc<dyn TaskStore> = Arc::new(client);
    let service = Arc::new(TaskBotService::from_config(store, &config, Arc::new(SystemClock)));
    let slack_runner = SocketModeRunner::with_dispatcher(task_dispatcher(Arc::clone(&service)));
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        handler_count = slack_runner.handler_count(),
        "slack handlers registered"
    );

    Ok(Application { config, service, slack_runner })
}

#[cfg(test)]
mod tests {
    use taskbot_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(app_token: &str, base_url: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                todoist_api_token: Some("todoist-token".to_owned()),
                todoist_base_url: base_url.map(str::to_owned),
                slack_app_token: Some(app_token.to_owned()),
                slack_bot_token: Some("xoxb-valid".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_on_invalid_slack_token() {
        let result = bootstrap(overrides("invalid-token", None));

        let Err(error) = result else {
            panic!("bootstrap should reject the app token");
        };
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("slack.app_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_every_slack_handler() {
        let app = bootstrap(overrides("xapp-valid", Some("http://127.0.0.1:9/rest/v2/")))
            .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.slack_runner.handler_count(), 5);
        assert_eq!(app.service.cache_stats(), Default::default());
        assert_eq!(app.config.cache.labels_secs, 60);
    }
}
