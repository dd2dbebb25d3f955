use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use faqbot_chat::PendingQuestionStore;
use serde::Serialize;
use tracing::{error, info};

const RUNNING: &str = "FAQ bot is running";

#[derive(Clone)]
pub struct HealthState {
    pending: Arc<PendingQuestionStore>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub pending_questions: usize,
    pub checked_at: String,
}

pub fn router(pending: Arc<PendingQuestionStore>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(HealthState { pending })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    pending: Arc<PendingQuestionStore>,
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
        if let Err(error) = axum::serve(listener, router(pending)).await {
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

pub async fn root() -> &'static str {
    RUNNING
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: "faqbot-server",
        version: env!("CARGO_PKG_VERSION"),
        pending_questions: state.pending.len().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
