//! Chat platform delivery through an incoming webhook.
//!
//! [`ChatWebhookChannel`] posts a JSON message to the configured URL. Each call
//! is a single attempt; retries belong to the notification retry sweep.

use std::time::Duration;

use async_trait::async_trait;
use podium_core::channels::Channel;
use podium_core::notification::UnlockMessage;

use super::{ChannelAdapter, DeliveryError};

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ChatWebhookChannel {
    client: reqwest::Client,
    url: Option<String>,
}

impl ChatWebhookChannel {
    /// Build the adapter. With no URL the adapter reports itself disabled.
    pub fn new(url: Option<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, url })
    }

    fn payload(message: &UnlockMessage) -> serde_json::Value {
        serde_json::json!({
            "text": message.text(),
            "player_id": message.player_id,
            "player_name": message.player_name,
            "achievement_id": message.achievement_id,
            "achievement_name": message.achievement_name,
            "points": message.points,
        })
    }
}

#[async_trait]
impl ChannelAdapter for ChatWebhookChannel {
    fn channel(&self) -> Channel {
        Channel::Chat
    }

    fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn deliver(&self, message: &UnlockMessage) -> Result<(), DeliveryError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| DeliveryError::Unavailable("CHAT_WEBHOOK_URL is not set".into()))?;

        let response = self
            .client
            .post(url)
            .json(&Self::payload(message))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }
        tracing::debug!(
            notification_id = message.notification_id,
            player_id = message.player_id,
            "Chat notification posted"
        );
        Ok(())
    }
}
