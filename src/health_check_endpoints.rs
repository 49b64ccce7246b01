//! Health, readiness and liveness probes

use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::{context::OpContext, AppState};

const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResponse {
    fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            error: None,
        }
    }
}

/// Basic health with uptime and build version
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        uptime: format!("{:?}", state.started_at.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe: the ledger must answer within five seconds
pub async fn readiness_probe(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    let ctx = OpContext::with_timeout(READINESS_TIMEOUT);

    match state.bets.health_check(&ctx).await {
        Ok(()) => (StatusCode::OK, Json(ProbeResponse::status("ready"))),
        Err(e) => {
            warn!(error = %e, "repository health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ProbeResponse {
                    status: "not ready".to_string(),
                    error: Some("repository unavailable".to_string()),
                }),
            )
        }
    }
}

/// Liveness probe (always OK while the process runs)
pub async fn liveness_probe() -> Json<ProbeResponse> {
    Json(ProbeResponse::status("alive"))
}
