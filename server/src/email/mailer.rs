use std::env;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

use crate::{error::AppResult, server_config::cfg};

/// A fully rendered outbound email.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

/// Seam to the mail-delivery collaborator. Returns the transport's message
/// id on success.
#[async_trait]
pub trait SendMail: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> AppResult<String>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the SMTP transport from config.toml plus `SMTP_USERNAME` /
    /// `SMTP_PASSWORD` from the environment.
    pub fn from_config() -> AppResult<Self> {
        let username = env::var("SMTP_USERNAME").context("SMTP_USERNAME is required")?;
        let password = env::var("SMTP_PASSWORD").context("SMTP_PASSWORD is required")?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp.host)
            .context("Could not build SMTP transport")?
            .port(cfg.smtp.port)
            .credentials(Credentials::new(username, password))
            .build();

        let from = cfg
            .smtp
            .from_address
            .parse()
            .context("smtp.from_address is invalid")?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl SendMail for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<String> {
        let builder = lettre::Message::builder()
            .to(format!("<{}>", email.to)
                .parse()
                .context("Could not parse digest recipient address")?)
            .from(self.from.clone())
            .subject(&email.subject);

        let message = match email.text {
            Some(text) => builder
                .multipart(MultiPart::alternative_plain_html(text, email.html))
                .context("Could not build digest email")?,
            None => builder
                .header(lettre::message::header::ContentType::TEXT_HTML)
                .body(email.html)
                .context("Could not build digest email")?,
        };

        let response = self
            .transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        Ok(response.message().collect::<Vec<_>>().join(" "))
    }
}
