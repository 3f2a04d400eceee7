use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use validator::Validate;

use crate::ServiceError;
use crate::email::{AttachmentDescriptor, EmailBody, ResolvedAttachment, normalize};
use crate::mailer::Mailer;
use crate::templating::{TemplateKind, strip_tags};

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Recipient {
    #[validate(email(message = "Each client must have a valid email address"))]
    pub email: String,
    #[serde(rename = "name")]
    #[validate(length(min = 1, max = 100, message = "Each client name must be 1-100 characters"))]
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct BulkRequest {
    pub recipients: Vec<Recipient>,
    pub subject: String,
    pub message: String,
    pub is_html: bool,
    pub attachments: Vec<AttachmentDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientOutcome {
    pub email: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of one bulk send. `results` is in recipient input order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendResult {
    pub results: Vec<RecipientOutcome>,
    pub total_sent: usize,
    pub total_failed: usize,
    pub timestamp: DateTime<Utc>,
}

impl BulkSendResult {
    fn from_outcomes(results: Vec<RecipientOutcome>) -> Self {
        let total_sent = results.iter().filter(|r| r.success).count();
        Self {
            total_failed: results.len() - total_sent,
            total_sent,
            results,
            timestamp: Utc::now(),
        }
    }
}

/// Fixed delay inserted between consecutive sends of one bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    delay: Duration,
}

impl PacingPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl Mailer {
    fn validate_bulk(&self, request: &BulkRequest) -> Result<(), ServiceError> {
        if request.recipients.is_empty() {
            return Err(ServiceError::Validation(
                "At least one recipient is required".to_string(),
            ));
        }
        if request.recipients.len() > self.max_recipients {
            return Err(ServiceError::Validation(format!(
                "At most {} recipients are allowed per request",
                self.max_recipients
            )));
        }
        if request.subject.trim().is_empty() {
            return Err(ServiceError::Validation("Subject is required".to_string()));
        }
        if request.message.trim().is_empty() {
            return Err(ServiceError::Validation("Message is required".to_string()));
        }
        Ok(())
    }

    fn bulk_body(
        &self,
        recipient: &Recipient,
        request: &BulkRequest,
    ) -> Result<EmailBody, ServiceError> {
        if request.is_html {
            return Ok(EmailBody::Both {
                text: strip_tags(&request.message),
                html: request.message.clone(),
            });
        }

        let rendered = self.renderer().render(
            TemplateKind::Custom,
            &liquid::object!({
                "client_name": recipient.display_name.clone(),
                "subject": request.subject.clone(),
                "message": request.message.clone(),
            }),
        )?;
        Ok(EmailBody::Both {
            text: rendered.text,
            html: rendered.html,
        })
    }

    async fn send_one(
        &self,
        from: &str,
        recipient: &Recipient,
        request: &BulkRequest,
        attachments: &Arc<[ResolvedAttachment]>,
    ) -> Result<String, ServiceError> {
        let body = self.bulk_body(recipient, request)?;
        let message = self
            .envelope(from, &recipient.email, &request.subject, body, Some("3"))
            .with_attachments(Arc::clone(attachments));
        let receipt = self.provider().send_email(message).await?;
        Ok(receipt.message_id)
    }

    /// Sends one message per recipient, in order, pausing between sends.
    /// A failed recipient is recorded and the loop moves on; only invalid
    /// input or an unusable sender abort the whole request.
    pub async fn send_bulk(&self, request: BulkRequest) -> Result<BulkSendResult, ServiceError> {
        self.validate_bulk(&request)?;
        let from = self.sender()?;

        let attachments: Arc<[ResolvedAttachment]> = Arc::from(normalize(&request.attachments));
        if let Some(root) = &self.attachment_root
            && let Some(outside) = attachments.iter().find(|a| !a.is_within(root))
        {
            return Err(ServiceError::Validation(format!(
                "Attachment {} is outside the allowed directory",
                outside.filename
            )));
        }
        info!(
            "Starting bulk send to {} recipients with {} attachments",
            request.recipients.len(),
            attachments.len()
        );

        let mut results = Vec::with_capacity(request.recipients.len());
        let last = request.recipients.len() - 1;

        for (index, recipient) in request.recipients.iter().enumerate() {
            let outcome = match self.send_one(&from, recipient, &request, &attachments).await {
                Ok(message_id) => {
                    info!("Bulk email sent to {} (Message ID: {})", recipient.email, message_id);
                    RecipientOutcome {
                        email: recipient.email.clone(),
                        success: true,
                        message_id: Some(message_id),
                        error: None,
                    }
                }
                Err(e) => {
                    error!("Failed to send bulk email to {}: {}", recipient.email, e);
                    RecipientOutcome {
                        email: recipient.email.clone(),
                        success: false,
                        message_id: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(outcome);

            if index < last {
                self.pacing.pause().await;
            }
        }

        let result = BulkSendResult::from_outcomes(results);
        info!(
            "Bulk send finished: {} sent, {} failed",
            result.total_sent, result.total_failed
        );
        Ok(result)
    }
}
