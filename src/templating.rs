use chrono::Datelike;
use liquid::model::Value;
use regex::Regex;
use std::{collections::HashMap, fmt, str::FromStr, sync::LazyLock};
use thiserror::Error;
use tracing::debug;

use crate::BrandConfig;

const HEADER: &str = include_str!("../templates/email/_header.html.liquid");
const FOOTER: &str = include_str!("../templates/email/_footer.html.liquid");

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Unknown email template: {0}")]
    UnknownTemplate(String),

    #[error("Failed to parse template {name}: {message}")]
    Parse { name: String, message: String },

    #[error("Failed to render template {name}: {message}")]
    Render { name: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    PasswordReset,
    Welcome,
    SupportResponse,
    Custom,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 4] = [
        TemplateKind::PasswordReset,
        TemplateKind::Welcome,
        TemplateKind::SupportResponse,
        TemplateKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::PasswordReset => "password-reset",
            TemplateKind::Welcome => "welcome",
            TemplateKind::SupportResponse => "support-response",
            TemplateKind::Custom => "custom",
        }
    }

    fn html_source(&self) -> &'static str {
        match self {
            TemplateKind::PasswordReset => {
                include_str!("../templates/email/password-reset.html.liquid")
            }
            TemplateKind::Welcome => include_str!("../templates/email/welcome.html.liquid"),
            TemplateKind::SupportResponse => {
                include_str!("../templates/email/support-response.html.liquid")
            }
            TemplateKind::Custom => include_str!("../templates/email/custom.html.liquid"),
        }
    }

    fn text_source(&self) -> &'static str {
        match self {
            TemplateKind::PasswordReset => {
                include_str!("../templates/email/password-reset.txt.liquid")
            }
            TemplateKind::Welcome => include_str!("../templates/email/welcome.txt.liquid"),
            TemplateKind::SupportResponse => {
                include_str!("../templates/email/support-response.txt.liquid")
            }
            TemplateKind::Custom => include_str!("../templates/email/custom.txt.liquid"),
        }
    }

    /// Variables a template reads. Missing ones are rendered as nil so the
    /// templates' `default` filters apply.
    fn variables(&self) -> &'static [&'static str] {
        match self {
            TemplateKind::PasswordReset => &["reset_url"],
            TemplateKind::Welcome => &["client_name", "login_url"],
            TemplateKind::SupportResponse => {
                &["client_name", "inquiry", "response", "action_required"]
            }
            TemplateKind::Custom => &["client_name", "subject", "message"],
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TemplateError::UnknownTemplate(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}

struct CompiledTemplate {
    name: &'static str,
    template: liquid::Template,
}

impl CompiledTemplate {
    fn parse(
        parser: &liquid::Parser,
        name: &'static str,
        source: &str,
    ) -> Result<Self, TemplateError> {
        let template = parser.parse(source).map_err(|e| TemplateError::Parse {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { name, template })
    }

    fn render(&self, globals: &liquid::Object) -> Result<String, TemplateError> {
        self.template
            .render(globals)
            .map_err(|e| TemplateError::Render {
                name: self.name.to_string(),
                message: e.to_string(),
            })
    }
}

struct CompiledEmail {
    html: CompiledTemplate,
    text: CompiledTemplate,
}

/// Renders the built-in email templates. Sources are compiled into the
/// binary and parsed once here, so rendering performs no I/O or parsing.
pub struct TemplateRenderer {
    brand: BrandConfig,
    header: CompiledTemplate,
    footer: CompiledTemplate,
    emails: HashMap<TemplateKind, CompiledEmail>,
}

impl TemplateRenderer {
    pub fn new(brand: BrandConfig) -> Result<Self, TemplateError> {
        let parser = build_parser()?;
        let header = CompiledTemplate::parse(&parser, "_header", HEADER)?;
        let footer = CompiledTemplate::parse(&parser, "_footer", FOOTER)?;

        let mut emails = HashMap::with_capacity(TemplateKind::ALL.len());
        for kind in TemplateKind::ALL {
            let compiled = CompiledEmail {
                html: CompiledTemplate::parse(&parser, kind.as_str(), kind.html_source())?,
                text: CompiledTemplate::parse(&parser, kind.as_str(), kind.text_source())?,
            };
            emails.insert(kind, compiled);
        }
        debug!("Parsed {} email templates", emails.len());

        Ok(Self {
            brand,
            header,
            footer,
            emails,
        })
    }

    pub fn brand(&self) -> &BrandConfig {
        &self.brand
    }

    pub fn render(
        &self,
        kind: TemplateKind,
        data: &liquid::Object,
    ) -> Result<RenderedEmail, TemplateError> {
        debug!("Rendering email template {}", kind);
        let email = self
            .emails
            .get(&kind)
            .ok_or_else(|| TemplateError::UnknownTemplate(kind.to_string()))?;

        let mut globals = data.clone();
        for name in kind.variables() {
            if !globals.contains_key(*name) {
                globals.insert((*name).into(), Value::Nil);
            }
        }
        globals.insert(
            "brand".into(),
            Value::Object(liquid::object!({
                "name": self.brand.name.clone(),
                "team_name": self.brand.team_name.clone(),
                "support_email": self.brand.support_email.clone(),
                "website": self.brand.website.clone(),
                "client_url": self.brand.client_url.clone(),
            })),
        );
        globals.insert(
            "current_year".into(),
            Value::scalar(chrono::Utc::now().year() as i64),
        );

        let heading = match kind {
            TemplateKind::PasswordReset => Value::scalar("Password Reset Request"),
            TemplateKind::Welcome => Value::scalar(format!("Welcome to {}!", self.brand.name)),
            TemplateKind::SupportResponse => Value::scalar("Support Response"),
            TemplateKind::Custom => data.get("subject").cloned().unwrap_or(Value::Nil),
        };
        globals.insert("heading".into(), heading);

        let header = self.header.render(&globals)?;
        let footer = self.footer.render(&globals)?;

        let text = email.text.render(&globals)?;

        globals.insert("header".into(), Value::scalar(header));
        globals.insert("footer".into(), Value::scalar(footer));
        let html = email.html.render(&globals)?;

        Ok(RenderedEmail {
            html,
            text: text.trim().to_string(),
        })
    }
}

fn build_parser() -> Result<liquid::Parser, TemplateError> {
    liquid::ParserBuilder::with_stdlib()
        .build()
        .map_err(|e| TemplateError::Parse {
            name: "parser".to_string(),
            message: e.to_string(),
        })
}

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Plain text fallback for caller supplied HTML: markup is removed, the
/// remaining text is kept as written.
pub fn strip_tags(html: &str) -> String {
    TAG_PATTERN.replace_all(html, "").into_owned()
}
