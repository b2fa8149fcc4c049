//! Outbound account mail: verification links, reset links and the
//! password-changed notice.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mail {
    Verification { link: String },
    PasswordReset { link: String },
    PasswordUpdated,
}

impl Mail {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Verification { .. } => "Verify your Cycle Market account",
            Self::PasswordReset { .. } => "Reset your Cycle Market password",
            Self::PasswordUpdated => "Your Cycle Market password was changed",
        }
    }

    pub fn text_body(&self) -> String {
        match self {
            Self::Verification { link } => {
                format!("Welcome to Cycle Market!\n\nConfirm your email address by opening this link:\n{link}\n")
            }
            Self::PasswordReset { link } => format!(
                "Someone asked to reset your password.\n\nOpen this link within the hour to choose a new one:\n{link}\n\nIf it wasn't you, ignore this email."
            ),
            Self::PasswordUpdated => {
                "Your password was just changed. You can now sign in with the new one.\n".to_string()
            }
        }
    }

    pub fn html_body(&self) -> String {
        let (heading, body) = match self {
            Self::Verification { link } => (
                "Welcome to Cycle Market",
                format!(r#"<p>Confirm your email address to finish signing up.</p><p><a href="{link}">Verify email</a></p>"#),
            ),
            Self::PasswordReset { link } => (
                "Reset your password",
                format!(
                    r#"<p>Open the link below within the hour to choose a new password.</p><p><a href="{link}">Reset password</a></p><p>If it wasn't you, ignore this email.</p>"#
                ),
            ),
            Self::PasswordUpdated => (
                "Password changed",
                "<p>Your password was just changed. You can now sign in with the new one.</p>".to_string(),
            ),
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{heading}</title></head>
<body style="font-family: Arial, sans-serif; color: #374151;">
<h1 style="font-size: 20px;">{heading}</h1>
{body}
</body>
</html>"#
        )
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, mail: &Mail) -> Result<()>;
}

/// Send and forget: a failed delivery is logged, never surfaced to the caller.
pub async fn deliver(mailer: &dyn Mailer, to: &str, mail: Mail) {
    if let Err(e) = mailer.send(to, &mail).await {
        warn!(to = %to, subject = mail.subject(), error = %e, "Failed to send mail");
    }
}

pub struct SmtpMailer {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let transport = match &config.host {
            Some(host) => {
                let builder = if config.tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                }
                .port(config.port);

                let builder = match (&config.username, &config.password) {
                    (Some(username), Some(password)) => {
                        builder.credentials(Credentials::new(username.clone(), password.clone()))
                    }
                    _ => builder,
                };
                Some(builder.build())
            }
            None => None,
        };

        Ok(Self { config, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, mail: &Mail) -> Result<()> {
        let Some(transport) = &self.transport else {
            warn!(to = %to, subject = mail.subject(), "SMTP not configured, skipping mail");
            return Ok(());
        };

        let from: Mailbox = self.config.from_address.parse()?;
        let recipient: Mailbox = to.parse()?;

        let message = Message::builder()
            .from(from)
            .to(recipient)
            .subject(mail.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text_body()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html_body()),
                    ),
            )?;

        transport.send(message).await?;

        info!(to = %to, subject = mail.subject(), "Mail sent");
        Ok(())
    }
}
