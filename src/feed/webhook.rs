//! Webhook delivery for feed notifications.
//!
//! Channels are configured statically as `(group, channel) -> webhook URL`
//! routes. Notifications are posted as a JSON embed.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::dispatch::{ChannelResolver, MessageSender};
use super::types::{Channel, Notification};
use crate::config::{ChannelRoute, DeliveryConfig};
use crate::error::{RelayError, Result};

/// Resolves and delivers to webhook channels.
pub struct WebhookMessenger {
    client: Client,
    username: String,
    channels: HashMap<(i64, i64), Channel>,
}

impl WebhookMessenger {
    /// Create a messenger from configured routes.
    pub fn new(routes: &[ChannelRoute], config: &DeliveryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Delivery(format!("failed to create HTTP client: {}", e)))?;

        let channels = routes
            .iter()
            .map(|route| {
                (
                    (route.group_id, route.channel_id),
                    Channel {
                        group_id: route.group_id,
                        channel_id: route.channel_id,
                        name: route.name.clone(),
                        endpoint: route.webhook_url.clone(),
                    },
                )
            })
            .collect();

        Ok(Self {
            client,
            username: config.username.clone(),
            channels,
        })
    }

    /// Number of configured channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait]
impl ChannelResolver for WebhookMessenger {
    async fn resolve(&self, group_id: i64, channel_id: i64) -> Option<Channel> {
        self.channels.get(&(group_id, channel_id)).cloned()
    }
}

#[async_trait]
impl MessageSender for WebhookMessenger {
    async fn send(&self, channel: &Channel, notification: &Notification) -> Result<()> {
        let payload = build_payload(&self.username, notification);
        debug!(target: "web_request", "Posting to channel {}: {}", channel.channel_id, payload);

        let response = self
            .client
            .post(&channel.endpoint)
            .header("Content-Type", "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| RelayError::Delivery(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RelayError::Delivery(format!(
                "webhook returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }
}

/// Build the JSON body for a notification.
///
/// Optional fields are omitted rather than sent as null.
pub fn build_payload(username: &str, notification: &Notification) -> Value {
    let mut embed = json!({
        "title": notification.title,
        "footer": { "text": notification.footer },
    });

    if let Some(url) = &notification.url {
        embed["url"] = json!(url);
    }
    if let Some(description) = &notification.description {
        embed["description"] = json!(description);
    }
    if let Some(image_url) = &notification.image_url {
        embed["image"] = json!({ "url": image_url });
    }

    json!({
        "username": username,
        "embeds": [embed],
    })
}
