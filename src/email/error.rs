use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Coarse classification of a failed SMTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportErrorKind {
    Auth,
    Connection,
    Timeout,
    Other,
}

impl TransportErrorKind {
    pub fn hint(&self) -> &'static str {
        match self {
            TransportErrorKind::Auth => {
                "Authentication failed. Check your email and app password."
            }
            TransportErrorKind::Connection => {
                "Connection failed. Check SMTP host and port settings."
            }
            TransportErrorKind::Timeout => {
                "Connection timeout. Check your internet connection and firewall settings."
            }
            TransportErrorKind::Other => "Unknown error",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Auth => write!(f, "authentication"),
            TransportErrorKind::Connection => write!(f, "connection"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Other => write!(f, "transport"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Email configuration error: {0}")]
    ConfigError(String),

    #[error("SMTP {kind} error: {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("Failed to read attachment {path}: {source}")]
    AttachmentRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid attachment {filename}: {reason}")]
    InvalidAttachment { filename: String, reason: String },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Failed to build message: {0}")]
    MessageBuild(String),
}

impl EmailError {
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        EmailError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Transport kind for failures that happened while talking to the
    /// server, `None` for failures detected locally.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            EmailError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = EmailError::transport(TransportErrorKind::Auth, "535 5.7.8 bad credentials");
        assert_eq!(
            err.to_string(),
            "SMTP authentication error: 535 5.7.8 bad credentials"
        );
        assert_eq!(err.transport_kind(), Some(TransportErrorKind::Auth));
    }

    #[test]
    fn test_attachment_read_is_not_transport() {
        let err = EmailError::AttachmentRead {
            path: "./missing.pdf".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.transport_kind().is_none());
        assert!(err.to_string().contains("./missing.pdf"));
    }
}
