use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::email::ResolvedAttachment;

/// Fully resolved envelope handed to a provider for one recipient.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub from: String,
    pub subject: String,
    pub body: EmailBody,
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "no_attachments")]
    pub attachments: Arc<[ResolvedAttachment]>,
}

fn no_attachments(attachments: &Arc<[ResolvedAttachment]>) -> bool {
    attachments.is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EmailBody {
    Text(String),
    Html(String),
    Both { text: String, html: String },
}

impl EmailBody {
    pub fn text(&self) -> Option<&str> {
        match self {
            EmailBody::Text(text) | EmailBody::Both { text, .. } => Some(text.as_str()),
            EmailBody::Html(_) => None,
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            EmailBody::Html(html) | EmailBody::Both { html, .. } => Some(html.as_str()),
            EmailBody::Text(_) => None,
        }
    }
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            from: from.into(),
            subject: subject.into(),
            body: EmailBody::Text(String::new()),
            reply_to: None,
            headers: BTreeMap::new(),
            attachments: Arc::from(Vec::new()),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = EmailBody::Text(text.into());
        self
    }

    pub fn with_both(mut self, text: impl Into<String>, html: impl Into<String>) -> Self {
        self.body = EmailBody::Both {
            text: text.into(),
            html: html.into(),
        };
        self
    }

    pub fn with_body(mut self, body: EmailBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_reply_to(mut self, reply_to: Option<String>) -> Self {
        self.reply_to = reply_to;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Arc<[ResolvedAttachment]>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// What a provider reports back for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

impl DeliveryReceipt {
    pub fn now(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Generates an RFC 5322 message id scoped to the sender's domain.
pub fn generate_message_id(domain: &str) -> String {
    format!("<{}@{}>", uuid::Uuid::new_v4(), domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{AttachmentSource, ResolvedAttachment};

    #[test]
    fn test_envelope_without_attachments_omits_field() {
        let message = EmailMessage::new("a@x.com", "Sender <s@x.com>", "Hi")
            .with_both("Hello", "<p>Hello</p>");
        let json = serde_json::to_value(&message).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("attachments"));
        assert!(!object.contains_key("headers"));
        assert_eq!(object["to"], serde_json::json!(["a@x.com"]));
    }

    #[test]
    fn test_envelope_with_attachments_serializes_them() {
        let attachments: Arc<[ResolvedAttachment]> = Arc::from(vec![ResolvedAttachment {
            filename: "report.pdf".to_string(),
            source: AttachmentSource::File {
                path: "./report.pdf".into(),
            },
        }]);
        let message = EmailMessage::new("a@x.com", "s@x.com", "Hi")
            .with_header("X-Priority", "3")
            .with_attachments(attachments);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["attachments"][0]["filename"], "report.pdf");
        assert_eq!(json["attachments"][0]["source"]["kind"], "file");
        assert_eq!(json["headers"]["X-Priority"], "3");
    }

    #[test]
    fn test_body_accessors() {
        let both = EmailBody::Both {
            text: "t".to_string(),
            html: "<b>h</b>".to_string(),
        };
        assert_eq!(both.text(), Some("t"));
        assert_eq!(both.html(), Some("<b>h</b>"));
        assert_eq!(EmailBody::Html("h".to_string()).text(), None);
        assert_eq!(EmailBody::Text("t".to_string()).html(), None);
    }

    #[test]
    fn test_generate_message_id() {
        let id = generate_message_id("example.com");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));
        assert_ne!(id, generate_message_id("example.com"));
    }
}
