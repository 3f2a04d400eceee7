use crate::Config;
use crate::email::EmailProviderConfig;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Sender address is not a valid mailbox: {0}")]
    InvalidSenderAddress(String),

    #[error("Reply-to address is not a valid mailbox: {0}")]
    InvalidReplyTo(String),

    #[error("Client URL is not a valid URL: {0}")]
    InvalidClientUrl(String),

    #[error("SMTP credentials are not configured")]
    MissingSmtpCredentials,
}

impl StartupCheckError {
    /// Critical failures mean no email could be sent at all.
    pub fn is_critical(&self) -> bool {
        matches!(self, StartupCheckError::InvalidSenderAddress(_))
    }
}

pub fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    match config.email.mailbox() {
        Ok(mailbox) => info!("Sender address: {}", mailbox),
        Err(e) => {
            let from = config.email.from_address.clone();
            error!("Sender address {:?} is invalid: {}", from, e);
            errors.push(StartupCheckError::InvalidSenderAddress(from));
        }
    }

    if let Some(reply_to) = &config.email.reply_to
        && reply_to.parse::<lettre::message::Mailbox>().is_err()
    {
        warn!("Reply-to address {:?} is invalid", reply_to);
        errors.push(StartupCheckError::InvalidReplyTo(reply_to.clone()));
    }

    match url::Url::parse(&config.brand.client_url) {
        Ok(url) => info!("Client URL: {}", url),
        Err(e) => {
            warn!("Client URL {:?} is invalid: {}", config.brand.client_url, e);
            warn!("Password reset and login links will be broken");
            errors.push(StartupCheckError::InvalidClientUrl(
                config.brand.client_url.clone(),
            ));
        }
    }

    match &config.email.provider {
        EmailProviderConfig::Smtp(smtp) => {
            info!("SMTP server: {}:{} ({:?})", smtp.host, smtp.port, smtp.tls);
            if smtp.username.is_none() || smtp.password.is_none() {
                warn!("SMTP username or password missing, sending without authentication");
                errors.push(StartupCheckError::MissingSmtpCredentials);
            }
        }
        EmailProviderConfig::Null => {
            warn!("Null email provider configured, emails will only be logged");
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
