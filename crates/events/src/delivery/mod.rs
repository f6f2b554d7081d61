//! Channel adapters that transmit unlock messages outside the engine.
//!
//! Adapters are fallible and side-effecting. The delivery sweep bounds every
//! call with a timeout and turns failures into the retry state machine; no
//! adapter error ever reaches the sweep's caller.

use std::time::Duration;

use async_trait::async_trait;
use podium_core::channels::Channel;
use podium_core::notification::UnlockMessage;

pub mod chat;

pub use chat::ChatWebhookChannel;

/// A failed delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The underlying HTTP request failed (network, DNS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The adapter cannot deliver at all, e.g. it is not configured.
    #[error("Channel unavailable: {0}")]
    Unavailable(String),
}

/// Transmits a rendered unlock message on one channel.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    /// Disabled adapters are skipped and their notifications fail.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn deliver(&self, message: &UnlockMessage) -> Result<(), DeliveryError>;
}
