//! Slack webhook alert channel
//!
//! Posts an attachment-style payload to an incoming-webhook URL. Delivery
//! succeeds only on an HTTP 2xx response; any other status or transport
//! error counts as a channel failure.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{AlertChannel, AlertEvent, ChannelError};
use crate::config::SlackSettings;

/// Fixed per-request timeout for webhook deliveries
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Sender identity shown in the channel
const SENDER_NAME: &str = "Disk Monitor";

/// Alert delivery via a Slack incoming webhook
pub struct SlackChannel {
    settings: SlackSettings,
    client: reqwest::Client,
}

impl SlackChannel {
    /// Creates the channel from its configuration block
    pub fn new(settings: SlackSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    fn build_payload(&self, event: &AlertEvent, timestamp: i64) -> serde_json::Value {
        json!({
            "channel": self.settings.channel,
            "username": SENDER_NAME,
            "icon_emoji": ":warning:",
            "attachments": [{
                "color": event.severity.color(),
                "title": event.subject,
                "text": event.body,
                "footer": "diskwatch",
                "ts": timestamp,
            }]
        })
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let payload = self.build_payload(event, chrono::Utc::now().timestamp());

        tracing::info!(channel = %self.settings.channel, "Sending Slack alert");
        let response = self
            .client
            .post(&self.settings.webhook_url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ChannelError::HttpStatus(status))
        }
    }
}
