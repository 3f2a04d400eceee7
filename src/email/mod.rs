pub mod attachments;
pub mod config;
pub mod error;
pub mod providers;
pub mod types;

pub use attachments::*;
pub use config::*;
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Delivers one fully formed message. Implementations own their transport
/// and never retry internally.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<DeliveryReceipt, EmailError>;

    /// Checks that the transport is reachable and accepts our credentials.
    async fn verify(&self) -> Result<(), EmailError>;

    fn name(&self) -> &str;
}

pub type DynEmailProvider = Arc<dyn EmailProvider>;

pub fn create_provider(config: &EmailConfig) -> Result<DynEmailProvider, EmailError> {
    match &config.provider {
        EmailProviderConfig::Smtp(smtp_config) => Ok(Arc::new(
            providers::smtp::SmtpProvider::new(smtp_config, config.sender_domain())?,
        )),
        EmailProviderConfig::Null => Ok(Arc::new(providers::null::NullProvider::new(
            config.sender_domain(),
        ))),
    }
}
