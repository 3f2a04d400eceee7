use axum::{
    Router,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::bulk::{BulkRequest, BulkSendResult, Recipient};
use crate::email::{AttachmentDescriptor, DeliveryReceipt};
use crate::mailer::{CustomContent, SupportResponse};
use crate::{AppState, ServiceError};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/test-config", get(test_config_handler))
        .route("/status", get(status_handler))
        .route("/send-password-reset", post(send_password_reset_handler))
        .route("/send-welcome", post(send_welcome_handler))
        .route("/send-support-response", post(send_support_response_handler))
        .route("/send-custom", post(send_custom_handler))
        .route("/send-bulk", post(send_bulk_handler))
}

/// JSON body that has passed its `validator` rules. Malformed JSON and rule
/// violations are both reported as validation errors.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ServiceError::Validation(rejection.body_text()))?;
        value.validate().map_err(|errors| {
            ServiceError::Validation(
                first_message(&errors).unwrap_or_else(|| "Invalid request".to_string()),
            )
        })?;
        Ok(ValidatedJson(value))
    }
}

/// Message of the first failing rule, fields taken in name order.
fn first_message(errors: &ValidationErrors) -> Option<String> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    fields.into_iter().find_map(|(_, kind)| match kind {
        ValidationErrorsKind::Field(errs) => errs.first().map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string())
        }),
        ValidationErrorsKind::Struct(inner) => first_message(inner),
        ValidationErrorsKind::List(items) => items.values().find_map(|inner| first_message(inner)),
    })
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[validate(length(min = 32, message = "Valid reset token is required"))]
    pub reset_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WelcomeRequest {
    #[serde(alias = "clientEmail")]
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[serde(alias = "firstName", alias = "clientName")]
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupportResponseRequest {
    #[validate(email(message = "Valid client email is required"))]
    pub client_email: String,
    #[validate(length(min = 1, max = 100, message = "Client name must be 1-100 characters"))]
    pub client_name: String,
    #[validate(length(min = 1, max = 1000, message = "Inquiry must be 1-1000 characters"))]
    pub inquiry: String,
    #[validate(length(min = 1, max = 2000, message = "Response must be 1-2000 characters"))]
    pub response: String,
    #[validate(length(max = 500, message = "Action required must be under 500 characters"))]
    pub action_required: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomEmailRequest {
    #[serde(alias = "email", alias = "clientEmail")]
    #[validate(email(message = "Valid recipient email is required"))]
    pub to: String,
    #[serde(alias = "clientName")]
    #[validate(length(max = 100, message = "Name must be under 100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters"))]
    pub subject: String,
    #[validate(length(max = 5000, message = "Message must be under 5000 characters"))]
    pub message: Option<String>,
    #[serde(default)]
    pub is_html: bool,
    pub html: Option<String>,
    pub text: Option<String>,
}

impl CustomEmailRequest {
    fn content(&self) -> CustomContent {
        match self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(message) => CustomContent::Message {
                message: message.to_string(),
                is_html: self.is_html,
            },
            None => CustomContent::Prebuilt {
                html: self.html.clone().filter(|h| !h.is_empty()),
                text: self.text.clone().filter(|t| !t.is_empty()),
            },
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkEmailRequest {
    // The upper bound is `[bulk] max_recipients`, checked by the mailer
    #[validate(length(min = 1, message = "At least one client is required"), nested)]
    pub clients: Vec<Recipient>,
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters"))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,
    #[serde(default)]
    pub is_html: bool,
    #[serde(default)]
    pub attachments: Vec<AttachmentDescriptor>,
}

impl From<BulkEmailRequest> for BulkRequest {
    fn from(request: BulkEmailRequest) -> Self {
        BulkRequest {
            recipients: request.clients,
            subject: request.subject,
            message: request.message,
            is_html: request.is_html,
            attachments: request.attachments,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatus {
    pub is_configured: bool,
    pub status: &'static str,
    pub last_checked: DateTime<Utc>,
    pub details: String,
    pub service: String,
    pub from_email: String,
}

pub async fn test_config_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let status = app_state.mailer.test_config().await;
    let code = if status.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(status))
}

pub async fn status_handler(State(app_state): State<AppState>) -> Json<EmailStatus> {
    let mailer = &app_state.mailer;
    let probe = mailer.test_config().await;

    Json(EmailStatus {
        is_configured: probe.success,
        status: if probe.success { "operational" } else { "error" },
        last_checked: probe.timestamp,
        details: probe
            .message
            .or(probe.details)
            .unwrap_or_else(|| "Unknown error".to_string()),
        service: mailer.provider_name().to_string(),
        from_email: mailer.from_address().to_string(),
    })
}

pub async fn send_password_reset_handler(
    State(app_state): State<AppState>,
    ValidatedJson(request): ValidatedJson<PasswordResetRequest>,
) -> Result<Json<ApiResponse<DeliveryReceipt>>, ServiceError> {
    let receipt = app_state
        .mailer
        .send_password_reset(&request.email, &request.reset_token)
        .await?;
    Ok(ApiResponse::ok("Password reset email sent successfully", receipt))
}

pub async fn send_welcome_handler(
    State(app_state): State<AppState>,
    ValidatedJson(request): ValidatedJson<WelcomeRequest>,
) -> Result<Json<ApiResponse<DeliveryReceipt>>, ServiceError> {
    let receipt = app_state
        .mailer
        .send_welcome(&request.email, &request.name)
        .await?;
    Ok(ApiResponse::ok("Welcome email sent successfully", receipt))
}

pub async fn send_support_response_handler(
    State(app_state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SupportResponseRequest>,
) -> Result<Json<ApiResponse<DeliveryReceipt>>, ServiceError> {
    let support = SupportResponse {
        client_email: request.client_email,
        client_name: request.client_name,
        inquiry: request.inquiry,
        response: request.response,
        action_required: request.action_required,
    };
    let receipt = app_state.mailer.send_support_response(&support).await?;
    Ok(ApiResponse::ok("Support response sent successfully", receipt))
}

pub async fn send_custom_handler(
    State(app_state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CustomEmailRequest>,
) -> Result<Json<ApiResponse<DeliveryReceipt>>, ServiceError> {
    let receipt = app_state
        .mailer
        .send_custom(
            &request.to,
            request.name.as_deref(),
            &request.subject,
            &request.content(),
        )
        .await?;
    Ok(ApiResponse::ok("Custom email sent successfully", receipt))
}

pub async fn send_bulk_handler(
    State(app_state): State<AppState>,
    ValidatedJson(request): ValidatedJson<BulkEmailRequest>,
) -> Result<Json<ApiResponse<BulkSendResult>>, ServiceError> {
    let result = app_state.mailer.send_bulk(request.into()).await?;
    let message = format!(
        "Bulk email completed: {} sent, {} failed",
        result.total_sent, result.total_failed
    );
    Ok(ApiResponse::ok(message, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_request_accepts_all_attachment_shapes() {
        let request: BulkEmailRequest = serde_json::from_value(serde_json::json!({
            "clients": [{ "email": "a@x.com", "name": "A" }],
            "subject": "Hi",
            "message": "Hello",
            "attachments": [
                "./report.pdf",
                { "filename": "notes.txt", "content": "aGk=", "contentType": "text/plain" },
                { "filename": "invoice.pdf", "path": "/srv/invoices/1.pdf" }
            ]
        }))
        .unwrap();

        assert!(request.validate().is_ok());
        assert!(!request.is_html);
        assert!(matches!(request.attachments[0], AttachmentDescriptor::PathRef(_)));
        assert!(matches!(
            request.attachments[1],
            AttachmentDescriptor::InlineContent { .. }
        ));
        assert!(matches!(
            request.attachments[2],
            AttachmentDescriptor::PathWithName { .. }
        ));
    }

    #[test]
    fn test_bulk_request_validates_nested_clients() {
        let request: BulkEmailRequest = serde_json::from_value(serde_json::json!({
            "clients": [{ "email": "not-an-email", "name": "A" }],
            "subject": "Hi",
            "message": "Hello"
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert_eq!(
            first_message(&errors).as_deref(),
            Some("Each client must have a valid email address")
        );

        let empty: BulkEmailRequest = serde_json::from_value(serde_json::json!({
            "clients": [],
            "subject": "Hi",
            "message": "Hello"
        }))
        .unwrap();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_welcome_request_aliases() {
        let request: WelcomeRequest = serde_json::from_value(serde_json::json!({
            "clientEmail": "grace@x.com",
            "firstName": "Grace"
        }))
        .unwrap();
        assert_eq!(request.email, "grace@x.com");
        assert_eq!(request.name, "Grace");
    }

    #[test]
    fn test_short_reset_token_rejected() {
        let request = PasswordResetRequest {
            email: "a@x.com".to_string(),
            reset_token: "short".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_custom_content_selection() {
        let mut request: CustomEmailRequest = serde_json::from_value(serde_json::json!({
            "to": "a@x.com",
            "subject": "Hi",
            "html": "<p>Hi</p>"
        }))
        .unwrap();
        assert!(matches!(
            request.content(),
            CustomContent::Prebuilt { html: Some(_), text: None }
        ));

        request.message = Some("Hello".to_string());
        request.is_html = true;
        assert!(matches!(
            request.content(),
            CustomContent::Message { is_html: true, .. }
        ));
    }
}
