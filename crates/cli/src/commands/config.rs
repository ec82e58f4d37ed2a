use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use taskbot_core::config::{AppConfig, LoadOptions};
use toml::Value;

use super::{CommandResult, EXIT_CONFIG_INVALID};

struct ConfigField {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_INVALID,
            )
        }
    };

    let path = detect_config_path();
    let doc = load_config_file_doc(path.as_deref());
    CommandResult::report(0, render(&config, doc.as_ref(), path.as_deref()))
}

pub fn render(config: &AppConfig, doc: Option<&Value>, path: Option<&Path>) -> String {
    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(config) {
        let source = field_source(field.key_path, field.env_keys, doc, path);
        lines.push(format!("- {} = {} (source: {source})", field.key_path, field.value));
    }
    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let field = |key_path: &'static str, env_keys: &'static [&'static str], value: String| {
        ConfigField { key_path, env_keys, value }
    };

    vec![
        field(
            "todoist.api_token",
            &["TASKBOT_TODOIST_API_TOKEN"],
            redact_token(config.todoist.api_token.expose_secret()),
        ),
        field("todoist.base_url", &["TASKBOT_TODOIST_BASE_URL"], config.todoist.base_url.clone()),
        field(
            "todoist.timeout_secs",
            &["TASKBOT_TODOIST_TIMEOUT_SECS"],
            config.todoist.timeout_secs.to_string(),
        ),
        field(
            "slack.app_token",
            &["TASKBOT_SLACK_APP_TOKEN"],
            redact_token(config.slack.app_token.expose_secret()),
        ),
        field(
            "slack.bot_token",
            &["TASKBOT_SLACK_BOT_TOKEN"],
            redact_token(config.slack.bot_token.expose_secret()),
        ),
        field(
            "cache.autocomplete_secs",
            &["TASKBOT_CACHE_AUTOCOMPLETE_SECS"],
            config.cache.autocomplete_secs.to_string(),
        ),
        field(
            "cache.labels_secs",
            &["TASKBOT_CACHE_LABELS_SECS"],
            config.cache.labels_secs.to_string(),
        ),
        field("cache.tasks_secs", &["TASKBOT_CACHE_TASKS_SECS"], config.cache.tasks_secs.to_string()),
        field(
            "completion.settle_secs",
            &["TASKBOT_COMPLETION_SETTLE_SECS"],
            config.completion.settle_secs.to_string(),
        ),
        field(
            "display.utc_offset_minutes",
            &["TASKBOT_DISPLAY_UTC_OFFSET_MINUTES"],
            config.display.utc_offset_minutes.to_string(),
        ),
        field(
            "server.bind_address",
            &["TASKBOT_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        field(
            "server.health_check_port",
            &["TASKBOT_SERVER_HEALTH_CHECK_PORT"],
            config.server.health_check_port.to_string(),
        ),
        field(
            "server.graceful_shutdown_secs",
            &["TASKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "logging.level",
            &["TASKBOT_LOGGING_LEVEL", "TASKBOT_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["TASKBOT_LOGGING_FORMAT", "TASKBOT_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["taskbot.toml", "config/taskbot.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    doc: Option<&Value>,
    path: Option<&Path>,
) -> String {
    let from_env = env_keys.iter().find(|key| {
        env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = from_env {
        return format!("env ({env_key})");
    }

    if doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file = path.map(|path| path.display().to_string()).unwrap_or_else(|| "config file".into());
        return format!("file ({file})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

/// Keeps the Slack token family prefix (`xapp`, `xoxb`) and hides the rest.
/// Todoist tokens carry no prefix and are hidden entirely.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('-') {
        Some((prefix, _)) if prefix.starts_with('x') => format!("{prefix}-***"),
        _ => "<redacted>".to_string(),
    }
}
