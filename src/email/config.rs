use lettre::{Address, address::AddressError, message::Mailbox};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub from_address: String,
    pub from_name: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(flatten)]
    pub provider: EmailProviderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum EmailProviderConfig {
    Smtp(SmtpConfig),
    Null,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: TlsMode,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// How the SMTP connection is secured. `StartTls` upgrades a plain
/// connection (port 587), `Tls` is implicit TLS (port 465).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    #[default]
    StartTls,
    Tls,
    None,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: default_smtp_port(),
            username: None,
            password: None,
            tls: TlsMode::default(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl EmailConfig {
    /// Sender mailbox. Display names containing specials such as commas are
    /// quoted when the mailbox is formatted.
    pub fn mailbox(&self) -> Result<Mailbox, AddressError> {
        let address: Address = self.from_address.parse()?;
        let name = self
            .from_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Ok(Mailbox::new(name, address))
    }

    /// Header form of the sender. Falls back to the bare configured address
    /// when it is not a valid mailbox; sending rejects that case separately.
    pub fn format_from(&self) -> String {
        match self.mailbox() {
            Ok(mailbox) => mailbox.to_string(),
            Err(_) => self.from_address.clone(),
        }
    }

    /// Domain part of the sender address, used for generated message ids.
    pub fn sender_domain(&self) -> &str {
        self.from_address
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
            .unwrap_or("localhost")
    }

    pub fn smtp(&self) -> Option<&SmtpConfig> {
        match &self.provider {
            EmailProviderConfig::Smtp(smtp) => Some(smtp),
            EmailProviderConfig::Null => None,
        }
    }
}
