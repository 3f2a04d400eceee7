use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::email::{EmailError, TransportErrorKind};
use crate::templating::TemplateError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller input was rejected before anything was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The service cannot send anything with its current configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Email(#[from] EmailError),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "Validation error",
            ServiceError::Configuration(_) => {
                "Email service configuration error. Please contact support."
            }
            ServiceError::Template(_) => "Failed to render email",
            ServiceError::Email(e) => match e.transport_kind() {
                Some(TransportErrorKind::Auth) => {
                    "Email service configuration error. Please contact support."
                }
                Some(TransportErrorKind::Connection) | Some(TransportErrorKind::Timeout) => {
                    "Unable to send email at this time. Please try again later."
                }
                _ => "Failed to send email. Please try again later.",
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let details = match &self {
            ServiceError::Validation(details) => details.clone(),
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "error": self.public_message(),
            "details": details,
        });

        (status, Json(body)).into_response()
    }
}
