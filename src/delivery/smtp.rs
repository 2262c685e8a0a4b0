use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::MailConfig;
use crate::delivery::{Delivery, Envelope};
use crate::error::DeliveryError;

fn parse_mailbox(value: &str) -> Result<Mailbox, Report<DeliveryError>> {
    value.parse().change_context(DeliveryError::Address {
        value: value.to_owned(),
    })
}

/// Read the SMTP password from the environment variable `var`.
pub fn password_from_env(var: &str) -> Result<String, Report<DeliveryError>> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Report::new(DeliveryError::Credentials {
            var: var.to_owned(),
        })
        .attach("set it in the environment or in a .env file")),
    }
}

/// Sends report images as attachments of a single STARTTLS SMTP message.
pub struct SmtpDelivery {
    host: String,
    port: u16,
    from: Mailbox,
    to: Vec<Mailbox>,
    username: String,
    password: String,
    timeout: Duration,
}

impl SmtpDelivery {
    pub fn new(config: &MailConfig, password: String) -> Result<Self, Report<DeliveryError>> {
        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            from,
            to,
            username: config.username.clone().unwrap_or_else(|| config.from.clone()),
            password,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn build_message(&self, envelope: &Envelope) -> Result<Message, Report<DeliveryError>> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(envelope.subject.as_str());
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(envelope.body.clone()));
        for image in &envelope.attachments {
            let content_type = ContentType::parse(image.content_type)
                .change_context(DeliveryError::Build)
                .attach_with(|| format!("content type: {}", image.content_type))?;
            parts = parts.singlepart(
                Attachment::new(image.file_name.clone()).body(image.bytes.clone(), content_type),
            );
        }

        builder.multipart(parts).change_context(DeliveryError::Build)
    }
}

impl Delivery for SmtpDelivery {
    fn name(&self) -> &str {
        "smtp"
    }

    fn deliver<'a>(
        &'a self,
        envelope: &'a Envelope,
    ) -> BoxFuture<'a, Result<(), Report<DeliveryError>>> {
        Box::pin(async move {
            let message = self.build_message(envelope)?;

            let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .change_context(DeliveryError::Transport)
                .attach_with(|| format!("smtp host: {}", self.host))?
                .port(self.port)
                .credentials(Credentials::new(
                    self.username.clone(),
                    self.password.clone(),
                ))
                .timeout(Some(self.timeout))
                .build();

            transport
                .send(message)
                .await
                .change_context(DeliveryError::Transport)
                .attach_with(|| format!("smtp host: {}:{}", self.host, self.port))?;

            info!(
                recipients = self.to.len(),
                attachments = envelope.attachments.len(),
                "report mail sent"
            );
            Ok(())
        })
    }
}
