use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

use crate::bulk::PacingPolicy;
use crate::email::{
    DeliveryReceipt, DynEmailProvider, EmailBody, EmailConfig, EmailMessage, TransportErrorKind,
};
use crate::templating::{TemplateKind, TemplateRenderer, strip_tags};
use crate::{BulkConfig, ServiceError};

/// Body of a custom email: either a message to run through the `custom`
/// template (or to use verbatim when it is already HTML), or bodies the
/// caller built itself.
#[derive(Debug, Clone)]
pub enum CustomContent {
    Message { message: String, is_html: bool },
    Prebuilt {
        html: Option<String>,
        text: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct SupportResponse {
    pub client_email: String,
    pub client_name: String,
    pub inquiry: String,
    pub response: String,
    pub action_required: Option<String>,
}

/// Outcome of probing the mail transport.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct Mailer {
    provider: DynEmailProvider,
    renderer: TemplateRenderer,
    email: EmailConfig,
    pub(crate) pacing: PacingPolicy,
    pub(crate) max_recipients: usize,
    pub(crate) attachment_root: Option<PathBuf>,
}

impl Mailer {
    pub fn new(
        provider: DynEmailProvider,
        renderer: TemplateRenderer,
        email: EmailConfig,
        bulk: BulkConfig,
    ) -> Self {
        Self {
            provider,
            renderer,
            email,
            pacing: bulk.pacing(),
            max_recipients: bulk.max_recipients,
            attachment_root: bulk.attachment_root,
        }
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn from_address(&self) -> &str {
        &self.email.from_address
    }

    pub(crate) fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub(crate) fn provider(&self) -> &DynEmailProvider {
        &self.provider
    }

    /// Formatted sender, rejected up front when the configured address is
    /// unusable so no send is attempted with it.
    pub(crate) fn sender(&self) -> Result<String, ServiceError> {
        let mailbox = self.email.mailbox().map_err(|e| {
            ServiceError::Configuration(format!(
                "invalid sender address {}: {}",
                self.email.from_address, e
            ))
        })?;
        Ok(mailbox.to_string())
    }

    pub(crate) fn envelope(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: EmailBody,
        priority: Option<&str>,
    ) -> EmailMessage {
        let mut message = EmailMessage::new(to, from, subject)
            .with_body(body)
            .with_reply_to(self.email.reply_to.clone())
            .with_header("X-Mailer", self.renderer.brand().name.clone());
        if let Some(priority) = priority {
            message = message.with_header("X-Priority", priority);
        }
        message
    }

    async fn deliver(
        &self,
        label: &str,
        message: EmailMessage,
    ) -> Result<DeliveryReceipt, ServiceError> {
        let recipients = message.to.join(", ");
        match self.provider.send_email(message).await {
            Ok(receipt) => {
                info!(
                    "{} email sent successfully to {} (Message ID: {})",
                    label, recipients, receipt.message_id
                );
                Ok(receipt)
            }
            Err(e) => {
                error!("Error sending {} email to {}: {}", label, recipients, e);
                Err(e.into())
            }
        }
    }

    fn rendered_body(
        &self,
        kind: TemplateKind,
        data: &liquid::Object,
    ) -> Result<EmailBody, ServiceError> {
        let rendered = self.renderer.render(kind, data)?;
        Ok(EmailBody::Both {
            text: rendered.text,
            html: rendered.html,
        })
    }

    pub async fn send_password_reset(
        &self,
        email: &str,
        reset_token: &str,
    ) -> Result<DeliveryReceipt, ServiceError> {
        let from = self.sender()?;
        let reset_url = format!(
            "{}/reset-password?token={}",
            self.renderer.brand().client_url.trim_end_matches('/'),
            reset_token
        );
        let body = self.rendered_body(
            TemplateKind::PasswordReset,
            &liquid::object!({ "reset_url": reset_url }),
        )?;
        let message = self.envelope(
            &from,
            email,
            "Password Reset Request - Action Required",
            body,
            Some("1"),
        );
        self.deliver("Password reset", message).await
    }

    pub async fn send_welcome(
        &self,
        email: &str,
        name: &str,
    ) -> Result<DeliveryReceipt, ServiceError> {
        let from = self.sender()?;
        let login_url = format!(
            "{}/login",
            self.renderer.brand().client_url.trim_end_matches('/')
        );
        let body = self.rendered_body(
            TemplateKind::Welcome,
            &liquid::object!({ "client_name": name, "login_url": login_url }),
        )?;
        let subject = format!("Welcome to {}!", self.renderer.brand().name);
        let message = self.envelope(&from, email, &subject, body, None);
        self.deliver("Welcome", message).await
    }

    pub async fn send_support_response(
        &self,
        support: &SupportResponse,
    ) -> Result<DeliveryReceipt, ServiceError> {
        let from = self.sender()?;
        let mut data = liquid::object!({
            "client_name": support.client_name.clone(),
            "inquiry": support.inquiry.clone(),
            "response": support.response.clone(),
        });
        if let Some(action) = support.action_required.as_deref().filter(|a| !a.is_empty()) {
            data.insert("action_required".into(), liquid::model::Value::scalar(action.to_string()));
        }
        let body = self.rendered_body(TemplateKind::SupportResponse, &data)?;
        let subject = format!(
            "Re: Your Support Request - {}",
            self.renderer.brand().name
        );
        let message = self.envelope(&from, &support.client_email, &subject, body, Some("3"));
        self.deliver("Support response", message).await
    }

    pub async fn send_custom(
        &self,
        email: &str,
        client_name: Option<&str>,
        subject: &str,
        content: &CustomContent,
    ) -> Result<DeliveryReceipt, ServiceError> {
        let from = self.sender()?;
        let body = self.compose_custom(client_name, subject, content)?;
        let message = self.envelope(&from, email, subject, body, Some("3"));
        self.deliver("Custom", message).await
    }

    /// Builds the body of a custom email. Pre-built bodies bypass the
    /// template entirely.
    pub fn compose_custom(
        &self,
        client_name: Option<&str>,
        subject: &str,
        content: &CustomContent,
    ) -> Result<EmailBody, ServiceError> {
        match content {
            CustomContent::Message {
                message,
                is_html: true,
            } => Ok(EmailBody::Both {
                text: strip_tags(message),
                html: message.clone(),
            }),
            CustomContent::Message {
                message,
                is_html: false,
            } => {
                let mut data = liquid::object!({
                    "subject": subject,
                    "message": message.clone(),
                });
                if let Some(name) = client_name {
                    data.insert(
                        "client_name".into(),
                        liquid::model::Value::scalar(name.to_string()),
                    );
                }
                self.rendered_body(TemplateKind::Custom, &data)
            }
            CustomContent::Prebuilt {
                html: Some(html),
                text: Some(text),
            } => Ok(EmailBody::Both {
                text: text.clone(),
                html: html.clone(),
            }),
            CustomContent::Prebuilt {
                html: Some(html),
                text: None,
            } => Ok(EmailBody::Both {
                text: strip_tags(html),
                html: html.clone(),
            }),
            CustomContent::Prebuilt {
                html: None,
                text: Some(text),
            } => Ok(EmailBody::Text(text.clone())),
            CustomContent::Prebuilt {
                html: None,
                text: None,
            } => Err(ServiceError::Validation(
                "Either HTML or text content is required".to_string(),
            )),
        }
    }

    /// Verifies the transport is reachable and accepts our credentials.
    pub async fn test_config(&self) -> ConfigStatus {
        match self.provider.verify().await {
            Ok(()) => {
                info!("Email configuration test passed ({})", self.provider.name());
                ConfigStatus {
                    success: true,
                    message: Some(
                        "Email configuration is valid and ready to send emails".to_string(),
                    ),
                    error: None,
                    details: None,
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                error!("Email configuration test failed: {}", e);
                let details = e
                    .transport_kind()
                    .unwrap_or(TransportErrorKind::Other)
                    .hint();
                ConfigStatus {
                    success: false,
                    message: None,
                    error: Some(e.to_string()),
                    details: Some(details.to_string()),
                    timestamp: Utc::now(),
                }
            }
        }
    }
}
