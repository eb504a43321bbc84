//! Outbound mail dispatch.
//!
//! The ingestion pipeline and the newsletter route talk to a [`Notifier`]
//! trait object; [`SmtpMailer`] is the production implementation over an
//! async SMTP transport. Sends are fire-and-forget from the caller's point
//! of view: every failure is logged and reported as `false`, never as an
//! error, because durable recording has already happened by the time any
//! mail goes out.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info, warn};

use crate::config::Config;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the welcome email to a new or returning subscriber.
    async fn send_welcome(&self, email: &str, name: Option<&str>) -> bool;

    /// Send one message to every recipient, optionally with a file
    /// attachment. Returns `true` only if all sends succeeded.
    async fn send_bulk(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
        attachment: Option<&Path>,
    ) -> bool;
}

/// SMTP-backed notifier (implicit-TLS relay, e.g. Gmail on port 465).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let from = config
            .mail_from
            .parse::<Mailbox>()
            .context("invalid from address")?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .context("invalid SMTP host")?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        } else {
            warn!("smtp_credentials_not_configured");
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    async fn send_one(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("invalid recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpMailer {
    async fn send_welcome(&self, email: &str, name: Option<&str>) -> bool {
        let body = welcome_body(name);

        match self.send_one(email, "Welcome to Our Newsletter!", &body).await {
            Ok(()) => {
                info!(recipient = %email, "welcome_email_sent");
                true
            }
            Err(e) => {
                warn!(recipient = %email, error = %format!("{e:#}"), "welcome_email_failed");
                false
            }
        }
    }

    async fn send_bulk(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
        attachment: Option<&Path>,
    ) -> bool {
        let attachment_part = match load_attachment(attachment).await {
            Ok(part) => part,
            Err(e) => {
                error!(error = %format!("{e:#}"), "attachment_load_failed");
                return false;
            }
        };

        let mut all_ok = true;
        for recipient in recipients {
            let result = match &attachment_part {
                Some(part) => self
                    .send_with_attachment(recipient, subject, body, part.clone())
                    .await,
                None => self.send_one(recipient, subject, body).await,
            };

            if let Err(e) = result {
                error!(recipient = %recipient, error = %format!("{e:#}"), "bulk_send_failed");
                all_ok = false;
            }
        }

        info!(
            recipient_count = recipients.len(),
            success = all_ok,
            "bulk_send_complete"
        );
        all_ok
    }
}

impl SmtpMailer {
    async fn send_with_attachment(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: SinglePart,
    ) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("invalid recipient address")?)
            .subject(subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body.to_string()))
                    .singlepart(attachment),
            )?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Read an optional attachment into a MIME part.
async fn load_attachment(path: Option<&Path>) -> Result<Option<SinglePart>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading attachment {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    Ok(Some(
        Attachment::new(filename).body(bytes, ContentType::parse("application/octet-stream")?),
    ))
}

/// Plain-text welcome email body, addressing the recipient by name.
fn welcome_body(name: Option<&str>) -> String {
    let name = match name {
        Some(n) if !n.is_empty() => n,
        _ => "there",
    };

    format!(
        "Hello {name},\n\n\
         Thank you for subscribing to our newsletter! We're excited to have you join our community.\n\n\
         You'll receive updates on our latest content, news, and special offers.\n\n\
         If you have any questions, feel free to reply to this email.\n\n\
         Best regards,\n\
         The Team\n"
    )
}
