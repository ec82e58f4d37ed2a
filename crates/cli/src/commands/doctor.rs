use anyhow::Context;
use secrecy::ExposeSecret;
use serde::Serialize;
use taskbot_core::config::{AppConfig, LoadOptions};
use taskbot_core::store::TaskStore;
use taskbot_todoist::TodoistClient;

use super::config::redact_token;
use super::{CommandResult, EXIT_CHECK_FAILED};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => build_report(Ok(&config)),
        Err(error) => build_report(Err(error.to_string())),
    };
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_CHECK_FAILED };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        return CommandResult::report(exit_code, output);
    }

    CommandResult::report(exit_code, render_human(&report))
}

pub fn build_report(config: Result<&AppConfig, String>) -> DoctorReport {
    let checks = match config {
        Ok(config) => vec![
            DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            },
            check_slack_tokens(config),
            check_todoist_connectivity(config),
        ],
        Err(error) => {
            let skipped = |name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            };
            vec![
                DoctorCheck { name: "config_validation", status: CheckStatus::Fail, details: error },
                skipped("slack_token_readiness"),
                skipped("todoist_connectivity"),
            ]
        }
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let (overall_status, summary) = if all_pass {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    } else {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    let app_token = config.slack.app_token.expose_secret();
    let bot_token = config.slack.bot_token.expose_secret();
    let problems: Vec<&str> = [
        (!app_token.starts_with("xapp-")).then_some("app token must start with `xapp-`"),
        (!bot_token.starts_with("xoxb-")).then_some("bot token must start with `xoxb-`"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !problems.is_empty() {
        return DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Fail,
            details: problems.join("; "),
        };
    }

    DoctorCheck {
        name: "slack_token_readiness",
        status: CheckStatus::Pass,
        details: format!(
            "app token {} and bot token {} have the expected prefixes",
            redact_token(app_token),
            redact_token(bot_token)
        ),
    }
}

fn check_todoist_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "todoist_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let client = TodoistClient::from_config(&config.todoist)
            .context("failed to build todoist client")?;
        let projects = client.list_projects().await.context("failed to list todoist projects")?;
        anyhow::Ok(projects.len())
    });

    match result {
        Ok(count) => DoctorCheck {
            name: "todoist_connectivity",
            status: CheckStatus::Pass,
            details: format!("reached `{}` and listed {count} project(s)", config.todoist.base_url),
        },
        Err(error) => DoctorCheck {
            name: "todoist_connectivity",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_config_skips_dependent_checks() {
        let report = build_report(Err("slack.app_token is required".to_string()));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.checks[0].status, CheckStatus::Fail);
        assert!(report.checks[1..].iter().all(|check| check.status == CheckStatus::Skipped));
        assert!(render_human(&report).contains("- [skip] todoist_connectivity"));
    }

    #[test]
    fn slack_check_reports_each_bad_prefix() {
        let mut config = AppConfig::default();
        config.slack.app_token = "xoxb-wrong".to_string().into();
        config.slack.bot_token = "xapp-wrong".to_string().into();

        let check = check_slack_tokens(&config);

        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.details.contains("`xapp-`"));
        assert!(check.details.contains("`xoxb-`"));
    }

    #[test]
    fn slack_check_never_prints_full_tokens() {
        let mut config = AppConfig::default();
        config.slack.app_token = "xapp-1-secret".to_string().into();
        config.slack.bot_token = "xoxb-2-secret".to_string().into();

        let check = check_slack_tokens(&config);

        assert_eq!(check.status, CheckStatus::Pass);
        assert!(!check.details.contains("secret"));
    }

    #[test]
    fn unreachable_todoist_fails_connectivity() {
        let mut config = AppConfig::default();
        config.todoist.api_token = "token".to_string().into();
        config.todoist.base_url = "http://127.0.0.1:9/rest/v2/".to_string();
        config.todoist.timeout_secs = 1;

        let check = check_todoist_connectivity(&config);

        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.details.starts_with("failed to list todoist projects"));
    }
}
