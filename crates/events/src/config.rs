//! Engine configuration loaded from environment variables.

use std::time::Duration;

use podium_core::channels::Channel;
use podium_core::notification::{
    RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETENTION_DAYS, DEFAULT_RETRY_WINDOW_HOURS,
};

/// Dispatcher, sweep and delivery settings.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bounded dispatcher queue size (default: `1024`).
    pub queue_capacity: usize,
    /// Dispatcher worker tasks (default: `4`).
    pub workers: usize,
    /// Delivery sweep interval (default: 30 s).
    pub delivery_interval: Duration,
    /// Retry sweep interval (default: 5 min).
    pub retry_interval: Duration,
    /// Cleanup sweep interval (default: 24 h).
    pub cleanup_interval: Duration,
    /// Upper bound on one adapter call (default: 10 s).
    pub delivery_timeout: Duration,
    /// Pending notifications handled per delivery sweep (default: `500`).
    pub delivery_batch_size: i64,
    pub retry_policy: RetryPolicy,
    /// Channels every unlock is announced on.
    pub channels: Vec<Channel>,
    /// Incoming-webhook URL for the chat channel. Unset disables the adapter.
    pub chat_webhook_url: Option<String>,
    /// Bound on dependent promotion depth after an unlock (default: `16`).
    pub cascade_max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            workers: 4,
            delivery_interval: Duration::from_secs(30),
            retry_interval: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(86_400),
            delivery_timeout: Duration::from_secs(10),
            delivery_batch_size: 500,
            retry_policy: RetryPolicy::default(),
            channels: Channel::ALL.to_vec(),
            chat_webhook_url: None,
            cascade_max_depth: 16,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}

/// Parse a comma-separated channel list, skipping unknown names.
pub fn parse_channels(raw: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match Channel::parse(name) {
            Some(channel) if !channels.contains(&channel) => channels.push(channel),
            Some(_) => {}
            None => tracing::warn!(channel = name, "Ignoring unknown notification channel"),
        }
    }
    channels
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default      |
    /// |-----------------------------------|--------------|
    /// | `DISPATCH_QUEUE_CAPACITY`         | `1024`       |
    /// | `DISPATCH_WORKERS`                | `4`          |
    /// | `DELIVERY_INTERVAL_SECS`          | `30`         |
    /// | `RETRY_INTERVAL_SECS`             | `300`        |
    /// | `CLEANUP_INTERVAL_SECS`           | `86400`      |
    /// | `DELIVERY_TIMEOUT_SECS`           | `10`         |
    /// | `DELIVERY_BATCH_SIZE`             | `500`        |
    /// | `NOTIFICATION_MAX_RETRIES`        | `3`          |
    /// | `NOTIFICATION_RETRY_WINDOW_HOURS` | `24`         |
    /// | `NOTIFICATION_RETENTION_DAYS`     | `30`         |
    /// | `NOTIFICATION_CHANNELS`           | `in_app,chat`|
    /// | `CHAT_WEBHOOK_URL`                | unset        |
    /// | `CASCADE_MAX_DEPTH`               | `16`         |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            env_parse::<u64>(key)
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let retry_policy = RetryPolicy {
            max_retries: env_parse("NOTIFICATION_MAX_RETRIES").unwrap_or(DEFAULT_MAX_RETRIES),
            retry_window: chrono::Duration::hours(
                env_parse("NOTIFICATION_RETRY_WINDOW_HOURS").unwrap_or(DEFAULT_RETRY_WINDOW_HOURS),
            ),
            retention: chrono::Duration::days(
                env_parse("NOTIFICATION_RETENTION_DAYS").unwrap_or(DEFAULT_RETENTION_DAYS),
            ),
        };

        let channels = std::env::var("NOTIFICATION_CHANNELS")
            .map(|raw| parse_channels(&raw))
            .unwrap_or(defaults.channels);

        let chat_webhook_url = std::env::var("CHAT_WEBHOOK_URL")
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Self {
            queue_capacity: env_parse::<usize>("DISPATCH_QUEUE_CAPACITY")
                .filter(|c| *c > 0)
                .unwrap_or(defaults.queue_capacity),
            workers: env_parse::<usize>("DISPATCH_WORKERS")
                .filter(|w| *w > 0)
                .unwrap_or(defaults.workers),
            delivery_interval: secs("DELIVERY_INTERVAL_SECS", defaults.delivery_interval),
            retry_interval: secs("RETRY_INTERVAL_SECS", defaults.retry_interval),
            cleanup_interval: secs("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval),
            delivery_timeout: secs("DELIVERY_TIMEOUT_SECS", defaults.delivery_timeout),
            delivery_batch_size: env_parse::<i64>("DELIVERY_BATCH_SIZE")
                .filter(|b| *b > 0)
                .unwrap_or(defaults.delivery_batch_size),
            retry_policy,
            channels,
            chat_webhook_url,
            cascade_max_depth: env_parse("CASCADE_MAX_DEPTH").unwrap_or(defaults.cascade_max_depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.retry_policy.max_retries, 3);
        assert_eq!(config.retry_policy.retry_window, chrono::Duration::hours(24));
        assert_eq!(config.retry_policy.retention, chrono::Duration::days(30));
        assert_eq!(config.channels, vec![Channel::InApp, Channel::Chat]);
        assert!(config.chat_webhook_url.is_none());
    }

    #[test]
    fn channel_list_skips_unknown_and_duplicates() {
        assert_eq!(
            parse_channels("chat, pager ,chat,in_app"),
            vec![Channel::Chat, Channel::InApp]
        );
        assert!(parse_channels("").is_empty());
    }
}
