use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod api;
pub mod bulk;
pub mod email;
pub mod error;
pub mod health;
pub mod mailer;
pub mod startup_checks;
pub mod templating;

pub use error::ServiceError;

use email::{DynEmailProvider, EmailConfig, EmailProviderConfig, SmtpConfig};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub brand: BrandConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Identity used inside rendered emails.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BrandConfig {
    pub name: String,
    pub team_name: String,
    pub support_email: String,
    pub website: String,
    /// Base URL of the client application; password reset and login links
    /// are built from it.
    pub client_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkConfig {
    #[serde(default = "default_bulk_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
    /// When set, file attachments must live below this directory.
    #[serde(default)]
    pub attachment_root: Option<PathBuf>,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_bulk_delay_ms() -> u64 {
    1000
}

fn default_max_recipients() -> usize {
    100
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_bulk_delay_ms(),
            max_recipients: default_max_recipients(),
            attachment_root: None,
        }
    }
}

impl BulkConfig {
    pub fn pacing(&self) -> bulk::PacingPolicy {
        bulk::PacingPolicy::fixed(Duration::from_millis(self.delay_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            app: AppConfig {
                name: "Mailroom".to_string(),
                environment: default_environment(),
            },
            brand: BrandConfig {
                name: "Mailroom".to_string(),
                team_name: "Mailroom Team".to_string(),
                support_email: "support@example.com".to_string(),
                website: "https://example.com".to_string(),
                client_url: "http://localhost:3000".to_string(),
            },
            email: EmailConfig {
                from_address: "noreply@example.com".to_string(),
                from_name: Some("Mailroom".to_string()),
                reply_to: None,
                provider: EmailProviderConfig::Smtp(SmtpConfig::default()),
            },
            bulk: BulkConfig::default(),
        }
    }
}

impl Config {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies deployment overrides looked up by environment variable name.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SMTP_HOST") {
            match &mut self.email.provider {
                EmailProviderConfig::Smtp(smtp) => smtp.host = host,
                EmailProviderConfig::Null => {
                    self.email.provider = EmailProviderConfig::Smtp(SmtpConfig {
                        host,
                        ..SmtpConfig::default()
                    });
                }
            }
        }

        if let EmailProviderConfig::Smtp(smtp) = &mut self.email.provider {
            if let Some(port) = lookup("SMTP_PORT").and_then(|p| p.parse().ok()) {
                smtp.port = port;
            }
            if let Some(user) = lookup("SMTP_USER") {
                smtp.username = Some(user);
            }
            if let Some(pass) = lookup("SMTP_PASS") {
                smtp.password = Some(pass);
            }
        }

        if let Some(name) = lookup("EMAIL_FROM_NAME") {
            self.email.from_name = Some(name);
        }
        if let Some(address) = lookup("EMAIL_FROM_ADDRESS") {
            self.email.from_address = address;
        }
        if let Some(url) = lookup("CLIENT_URL") {
            self.brand.client_url = url;
        }
        if let Some(env) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            self.app.environment = env;
        }
    }
}

use axum::Router;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub mailer: Arc<mailer::Mailer>,
    pub config: Config,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, provider: DynEmailProvider) -> Result<Self, ServiceError> {
        let renderer = templating::TemplateRenderer::new(config.brand.clone())?;
        let mailer = mailer::Mailer::new(
            provider,
            renderer,
            config.email.clone(),
            config.bulk.clone(),
        );

        Ok(Self {
            mailer: Arc::new(mailer),
            config,
            started_at: Instant::now(),
        })
    }
}

pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health::health_handler))
        .nest("/api/email", api::routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %request.uri().path(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
