//! Process configuration, read once from the environment at startup and then
//! shared read-only through [`crate::state::AppStateInner`].

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Static pages that the verification / reset links point at.
    pub public_dir: PathBuf,
    /// Base of the link mailed after sign-up; `?id=..&token=..` is appended.
    pub verification_link: String,
    /// Base of the link mailed for a password reset.
    pub password_reset_link: String,
    pub smtp: SmtpConfig,
    pub cloud: CloudConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub from_address: String,
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("MARKET_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MARKET_JWT_SECRET is unset or still a placeholder");
        }

        let port = env_or("MARKET_PORT", "8000")
            .parse()
            .context("MARKET_PORT must be a port number")?;

        let smtp = SmtpConfig {
            host: env_opt("MARKET_SMTP_HOST"),
            port: env_or("MARKET_SMTP_PORT", "2525")
                .parse()
                .context("MARKET_SMTP_PORT must be a port number")?,
            username: env_opt("MARKET_SMTP_USER"),
            password: env_opt("MARKET_SMTP_PASS"),
            tls: env_or("MARKET_SMTP_TLS", "false")
                .parse()
                .context("MARKET_SMTP_TLS must be true or false")?,
            from_address: env_or("MARKET_MAIL_FROM", "Cycle Market <no-reply@cycle-market.local>"),
        };

        let cloud = CloudConfig {
            cloud_name: env_opt("MARKET_CLOUD_NAME").context("MARKET_CLOUD_NAME is required")?,
            api_key: env_opt("MARKET_CLOUD_KEY").context("MARKET_CLOUD_KEY is required")?,
            api_secret: env_opt("MARKET_CLOUD_SECRET").context("MARKET_CLOUD_SECRET is required")?,
            api_base: env_or("MARKET_CLOUD_API_BASE", "https://api.cloudinary.com/v1_1"),
        };

        Ok(Self {
            jwt_secret,
            db_path: env_or("MARKET_DB_PATH", "cycle-market.db").into(),
            host: env_or("MARKET_HOST", "0.0.0.0"),
            port,
            public_dir: env_or("MARKET_PUBLIC_DIR", "public").into(),
            verification_link: env_or("MARKET_VERIFICATION_LINK", "http://localhost:8000/verify/"),
            password_reset_link: env_or(
                "MARKET_PASSWORD_RESET_LINK",
                "http://localhost:8000/reset-password/",
            ),
            smtp,
            cloud,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
