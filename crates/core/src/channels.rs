//! Notification channels.
//!
//! The string names must match the values stored in the
//! `achievement_notifications.channel` column.

use serde::{Deserialize, Serialize};

/// In-app feed. Clients read the feed straight from storage, so delivery
/// is deferred to the reader.
pub const CHANNEL_IN_APP: &str = "in_app";

/// Chat platform message posted through an incoming webhook.
pub const CHANNEL_CHAT: &str = "chat";

/// How the delivery sweep treats a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// The adapter must transmit the message; failures are retried.
    Immediate,
    /// Nothing to transmit. The sweep marks the notification `SENT` without
    /// calling an adapter.
    Deferred,
}

/// A notification delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Chat,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::InApp, Channel::Chat];

    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => CHANNEL_IN_APP,
            Channel::Chat => CHANNEL_CHAT,
        }
    }

    /// Parse a stored channel name. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            CHANNEL_IN_APP => Some(Channel::InApp),
            CHANNEL_CHAT => Some(Channel::Chat),
            _ => None,
        }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        match self {
            Channel::InApp => DeliveryPolicy::Deferred,
            Channel::Chat => DeliveryPolicy::Immediate,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_stored_names() {
        assert_eq!(Channel::parse("in_app"), Some(Channel::InApp));
        assert_eq!(Channel::parse(" chat "), Some(Channel::Chat));
        assert_eq!(Channel::parse("carrier_pigeon"), None);
    }

    #[test]
    fn in_app_is_deferred() {
        assert_eq!(Channel::InApp.policy(), DeliveryPolicy::Deferred);
        assert_eq!(Channel::Chat.policy(), DeliveryPolicy::Immediate);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Channel::InApp).unwrap();
        assert_eq!(json, "\"in_app\"");
    }
}
