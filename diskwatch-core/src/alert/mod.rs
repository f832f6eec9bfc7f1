//! Multi-channel alert dispatch
//!
//! An [`AlertEvent`] fans out to every enabled channel independently. One
//! channel failing never prevents the others from being attempted, and
//! delivery failures are reported in the [`DispatchReport`] rather than
//! propagated as errors.

mod email;
mod slack;

pub use email::EmailChannel;
pub use slack::SlackChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AlertSettings;

/// Errors raised by individual alert channels
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// SMTP transport failure (connect, TLS, auth, send)
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// A configured sender or recipient address is not a valid mailbox
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The email message could not be assembled
    #[error("Failed to build email message: {0}")]
    Message(#[from] lettre::error::Error),

    /// Webhook transport failure (connect, TLS, timeout)
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook endpoint answered with a non-success status
    #[error("Webhook returned status {0}")]
    HttpStatus(reqwest::StatusCode),
}

/// Alert urgency tier, driving presentation in notification channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Something needs attention soon
    Warning,
    /// Something needs attention now
    Critical,
}

impl Severity {
    /// Lowercase name of the severity
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Attachment color for chat channels
    pub const fn color(self) -> &'static str {
        match self {
            Self::Info => "#36a64f",
            Self::Warning => "#ff9900",
            Self::Critical => "#ff0000",
        }
    }

    /// Parses a severity name, falling back to [`Severity::Warning`] for
    /// anything unrecognized
    pub fn parse(name: &str) -> Self {
        match name {
            "info" => Self::Info,
            "critical" => Self::Critical,
            _ => Self::Warning,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert, constructed by the orchestrator and consumed once
#[derive(Debug, Clone)]
pub struct AlertEvent {
    /// Subject line / title
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// Urgency tier
    pub severity: Severity,
    /// Host the alert concerns
    pub host: String,
}

impl AlertEvent {
    /// Creates a new alert event
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        severity: Severity,
        host: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            severity,
            host: host.into(),
        }
    }
}

/// An independently configured alert delivery mechanism
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Short channel name used in logs and reports
    fn name(&self) -> &'static str;

    /// Attempts to deliver one alert.
    ///
    /// # Errors
    ///
    /// Returns the channel-specific transport error; the dispatcher records
    /// it and carries on with the remaining channels.
    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError>;
}

/// A delivery failure on one channel
#[derive(Debug, Clone)]
pub struct ChannelFailure {
    /// Which channel failed
    pub channel: &'static str,
    /// Transport-level detail
    pub detail: String,
}

/// Outcome of dispatching one event across all enabled channels
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Number of channels attempted
    pub attempted: usize,
    /// Failures, one entry per failed channel
    pub failures: Vec<ChannelFailure>,
}

impl DispatchReport {
    /// True iff every attempted channel succeeded
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fans alert events out to the enabled channels
pub struct AlertDispatcher {
    channels: Vec<Box<dyn AlertChannel>>,
}

impl AlertDispatcher {
    /// Creates a dispatcher over an explicit channel list
    pub fn new(channels: Vec<Box<dyn AlertChannel>>) -> Self {
        Self { channels }
    }

    /// Builds a dispatcher from configuration, instantiating only the
    /// channels whose `enabled` flag is set
    pub fn from_settings(settings: &AlertSettings) -> Self {
        let mut channels: Vec<Box<dyn AlertChannel>> = Vec::new();
        if let Some(email) = &settings.email {
            if email.enabled {
                channels.push(Box::new(EmailChannel::new(email.clone())));
            }
        }
        if let Some(slack) = &settings.slack {
            if slack.enabled {
                channels.push(Box::new(SlackChannel::new(slack.clone())));
            }
        }
        Self::new(channels)
    }

    /// Number of enabled channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Delivers one event on every enabled channel.
    ///
    /// Channels are attempted in order with no short-circuit; each failure
    /// is logged with its transport detail and recorded in the report.
    pub async fn dispatch(&self, event: &AlertEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        for channel in &self.channels {
            report.attempted += 1;
            match channel.send(event).await {
                Ok(()) => {
                    tracing::info!(
                        channel = channel.name(),
                        host = %event.host,
                        "Alert delivered"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        channel = channel.name(),
                        host = %event.host,
                        error = %err,
                        "Alert delivery failed"
                    );
                    report.failures.push(ChannelFailure {
                        channel: channel.name(),
                        detail: err.to_string(),
                    });
                }
            }
        }
        report
    }
}
