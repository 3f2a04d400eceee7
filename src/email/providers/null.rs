use crate::email::{
    DeliveryReceipt, EmailBody, EmailError, EmailMessage, EmailProvider, generate_message_id,
};
use async_trait::async_trait;
use tracing::info;

/// Logs messages instead of delivering them.
pub struct NullProvider {
    domain: String,
}

impl NullProvider {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

impl Default for NullProvider {
    fn default() -> Self {
        Self::new("localhost")
    }
}

#[async_trait]
impl EmailProvider for NullProvider {
    async fn send_email(&self, message: EmailMessage) -> Result<DeliveryReceipt, EmailError> {
        // Attachments are still loaded so unreadable files fail the same way
        // they would against a real server
        let mut attachment_summary = Vec::with_capacity(message.attachments.len());
        for attachment in message.attachments.iter() {
            let loaded = attachment.load().await?;
            attachment_summary.push(format!(
                "{} ({}, {} bytes, {})",
                loaded.filename,
                loaded.content_type,
                loaded.data.len(),
                if attachment.is_inline() { "inline" } else { "file" }
            ));
        }

        let recipients = message.to.join(", ");

        let body_preview = match &message.body {
            EmailBody::Text(text) => text.chars().take(200).collect::<String>(),
            EmailBody::Html(html) => html.chars().take(200).collect::<String>(),
            EmailBody::Both { text, .. } => text.chars().take(200).collect::<String>(),
        };

        let message_id = generate_message_id(&self.domain);

        info!(
            "NULL EMAIL PROVIDER - Would send email:\n\
             Message-ID: {}\n\
             From: {}\n\
             To: {}\n\
             Reply-To: {}\n\
             Subject: {}\n\
             Attachments: {}\n\
             Body (first 200 chars): {}{}",
            message_id,
            message.from,
            recipients,
            message.reply_to.as_deref().unwrap_or("(none)"),
            message.subject,
            if attachment_summary.is_empty() {
                "(none)".to_string()
            } else {
                attachment_summary.join(", ")
            },
            body_preview,
            if body_preview.chars().count() >= 200 { "..." } else { "" }
        );

        let full_body = match &message.body {
            EmailBody::Text(text) => format!("Text:\n{}", text),
            EmailBody::Html(html) => format!("HTML:\n{}", html),
            EmailBody::Both { text, html } => format!("Text:\n{}\n\nHTML:\n{}", text, html),
        };

        tracing::debug!(
            "NULL EMAIL PROVIDER - Full email message:\n\
             Headers: {:?}\n\
             Body:\n{}",
            message.headers,
            full_body
        );

        Ok(DeliveryReceipt::now(message_id))
    }

    async fn verify(&self) -> Result<(), EmailError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "Null Email Provider (Logging Only)"
    }
}
