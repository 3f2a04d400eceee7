use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub environment: String,
    pub email: EmailHealth,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailHealth {
    pub status: &'static str,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Reports 503 whenever the mail transport cannot be verified.
pub async fn health_handler(State(app_state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let probe = app_state.mailer.test_config().await;
    let (code, status) = if probe.success {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let report = HealthReport {
        status,
        service: app_state.config.app.name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: app_state.started_at.elapsed().as_secs(),
        environment: app_state.config.app.environment.clone(),
        email: EmailHealth {
            status: if probe.success { "operational" } else { "error" },
            provider: app_state.mailer.provider_name().to_string(),
            details: probe.error,
        },
        timestamp: Utc::now(),
    };

    (code, Json(report))
}
