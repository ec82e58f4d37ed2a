use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use taskbot_slack::{CacheStats, TaskBotService};
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    service: Arc<TaskBotService>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub caches: CacheStats,
    pub pending_completions: usize,
    pub checked_at: String,
}

pub fn router(service: Arc<TaskBotService>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { service })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    service: Arc<TaskBotService>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(service)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "taskbot-server runtime initialized".to_string(),
        },
        caches: state.service.cache_stats(),
        pending_completions: state.service.pending_completions(),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
