//! SMTP email alert channel
//!
//! Builds a plain-text message and delivers it through a STARTTLS SMTP
//! relay. The transport is constructed per delivery so the SMTP session is
//! scoped to the call and released whether or not the send succeeds.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;

use super::{AlertChannel, AlertEvent, ChannelError};
use crate::config::EmailSettings;

/// Email delivery via an authenticated SMTP relay
pub struct EmailChannel {
    settings: EmailSettings,
}

impl EmailChannel {
    /// Creates the channel from its configuration block
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, event: &AlertEvent) -> Result<Message, ChannelError> {
        let sender: Mailbox = self.settings.sender.parse()?;
        let mut builder = Message::builder()
            .from(sender)
            .subject(event.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.settings.recipients {
            builder = builder.to(recipient.parse()?);
        }
        Ok(builder.body(event.body.clone())?)
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let message = self.build_message(event)?;

        let credentials = Credentials::new(
            self.settings.sender.clone(),
            self.settings.password.expose_secret().to_string(),
        );
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.smtp_server)?
            .port(self.settings.smtp_port)
            .credentials(credentials)
            .build();

        tracing::info!(
            recipients = self.settings.recipients.len(),
            relay = %self.settings.smtp_server,
            "Sending email alert"
        );
        mailer.send(message).await?;
        Ok(())
    }
}
