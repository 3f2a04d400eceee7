use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{
        Attachment, Mailbox, MultiPart, SinglePart,
        header::{ContentType, HeaderName, HeaderValue},
    },
    transport::smtp::{PoolConfig, authentication::Credentials},
};
use std::time::Duration;
use tracing::{debug, error};

use crate::email::{
    DeliveryReceipt, EmailBody, EmailError, EmailMessage, EmailProvider, SmtpConfig, TlsMode,
    TransportErrorKind, generate_message_id,
};

/// Upper bound on pooled SMTP connections shared by all sends.
pub const MAX_POOLED_CONNECTIONS: u32 = 5;

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    domain: String,
}

impl SmtpProvider {
    pub fn new(config: &SmtpConfig, domain: &str) -> Result<Self, EmailError> {
        let builder = match config.tls {
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| EmailError::ConfigError(format!("Invalid SMTP relay: {}", e)))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| EmailError::ConfigError(format!("Invalid SMTP relay: {}", e)))?,
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .pool_config(PoolConfig::new().max_size(MAX_POOLED_CONNECTIONS));

        // Servers without AUTH (local relays, Mailpit) are configured without credentials
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            domain: domain.to_string(),
        })
    }

    async fn build_message(
        &self,
        message: &EmailMessage,
        message_id: &str,
    ) -> Result<Message, EmailError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| EmailError::InvalidEmail(format!("{}: {}", message.from, e)))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(message.subject.clone())
            .message_id(Some(message_id.to_string()));

        for recipient in &message.to {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| EmailError::InvalidEmail(format!("{}: {}", recipient, e)))?;
            builder = builder.to(to);
        }

        if let Some(reply_to) = &message.reply_to {
            let reply_to: Mailbox = reply_to
                .parse()
                .map_err(|e| EmailError::InvalidEmail(format!("{}: {}", reply_to, e)))?;
            builder = builder.reply_to(reply_to);
        }

        for (name, value) in &message.headers {
            let header_name = HeaderName::new_from_ascii(name.clone())
                .map_err(|e| EmailError::MessageBuild(format!("header {}: {}", name, e)))?;
            builder = builder.raw_header(HeaderValue::new(header_name, value.clone()));
        }

        let built = if message.attachments.is_empty() {
            match &message.body {
                EmailBody::Text(text) => builder.singlepart(SinglePart::plain(text.clone())),
                EmailBody::Html(html) => builder.singlepart(SinglePart::html(html.clone())),
                EmailBody::Both { text, html } => builder.multipart(
                    MultiPart::alternative_plain_html(text.clone(), html.clone()),
                ),
            }
        } else {
            let mut mixed = match &message.body {
                EmailBody::Text(text) => {
                    MultiPart::mixed().singlepart(SinglePart::plain(text.clone()))
                }
                EmailBody::Html(html) => {
                    MultiPart::mixed().singlepart(SinglePart::html(html.clone()))
                }
                EmailBody::Both { text, html } => MultiPart::mixed().multipart(
                    MultiPart::alternative_plain_html(text.clone(), html.clone()),
                ),
            };

            for attachment in message.attachments.iter() {
                let loaded = attachment.load().await?;
                let content_type = ContentType::parse(&loaded.content_type).map_err(|e| {
                    EmailError::InvalidAttachment {
                        filename: loaded.filename.clone(),
                        reason: format!("content type {}: {}", loaded.content_type, e),
                    }
                })?;
                mixed = mixed.singlepart(
                    Attachment::new(loaded.filename).body(loaded.data, content_type),
                );
            }

            builder.multipart(mixed)
        };

        built.map_err(|e| EmailError::MessageBuild(e.to_string()))
    }
}

/// Maps a failed SMTP exchange onto a transport error kind. `code` is the
/// three digit reply code when the server answered.
pub fn classify_failure(code: Option<&str>, timed_out: bool, message: &str) -> TransportErrorKind {
    let lowered = message.to_lowercase();
    if timed_out || lowered.contains("timed out") || lowered.contains("timeout") {
        return TransportErrorKind::Timeout;
    }
    match code {
        Some("530") | Some("534") | Some("535") => TransportErrorKind::Auth,
        Some(_) if lowered.contains("authentication") || lowered.contains("credentials") => {
            TransportErrorKind::Auth
        }
        Some(_) => TransportErrorKind::Other,
        None if lowered.contains("authentication") => TransportErrorKind::Auth,
        None => TransportErrorKind::Connection,
    }
}

fn transport_error(err: lettre::transport::smtp::Error) -> EmailError {
    let code = err.status().map(|code| code.to_string());
    let message = err.to_string();
    let kind = classify_failure(code.as_deref(), err.is_timeout(), &message);
    match kind {
        TransportErrorKind::Auth => error!("Authentication failed. Check SMTP credentials."),
        TransportErrorKind::Connection => error!("Connection failed. Check SMTP host and port."),
        _ => {}
    }
    EmailError::transport(kind, message)
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send_email(&self, message: EmailMessage) -> Result<DeliveryReceipt, EmailError> {
        debug!("Sending email via SMTP to: {:?}", message.to);

        let message_id = generate_message_id(&self.domain);
        let email = self.build_message(&message, &message_id).await?;

        match self.transport.send(email).await {
            Ok(response) => {
                debug!(
                    "Email sent successfully. Message ID: {} ({:?})",
                    message_id,
                    response.code()
                );
                Ok(DeliveryReceipt::now(message_id))
            }
            Err(e) => {
                error!("Failed to send email via SMTP: {}", e);
                Err(transport_error(e))
            }
        }
    }

    async fn verify(&self) -> Result<(), EmailError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(EmailError::transport(
                TransportErrorKind::Connection,
                "SMTP server did not accept the connection test",
            )),
            Err(e) => Err(transport_error(e)),
        }
    }

    fn name(&self) -> &str {
        "SMTP"
    }
}
