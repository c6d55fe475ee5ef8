use std::time::Duration;

use crate::models::messages::MAX_BODY_CHARS;

/// Connection settings for the Pusher-protocol broadcast server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PusherConfig {
    pub app_key: String,
    pub host: String,
    pub port: u16,
    pub tls: bool,
    /// Endpoint that signs private-channel subscriptions.
    pub auth_url: String,
    pub reconnect_delay: Duration,
    /// Timeout for the channel-auth request.
    pub auth_timeout: Duration,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub api_url: String,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
    pub max_body_chars: usize,
    pub identity_ttl: Duration,
    /// `None` runs every conversation in polling mode.
    pub pusher: Option<PusherConfig>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api/v1".to_string(),
            http_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(3000), // 3 seconds
            max_body_chars: MAX_BODY_CHARS,
            identity_ttl: Duration::from_secs(3600), // 1 hour
            pusher: None,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source. Unset or unparsable values
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("CHAT_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let http_timeout = Duration::from_secs(parse_or(&lookup, "CHAT_HTTP_TIMEOUT_SECS", 15));

        let pusher = lookup("PUSHER_APP_KEY")
            .filter(|key| !key.is_empty())
            .map(|app_key| PusherConfig {
                app_key,
                host: lookup("PUSHER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                port: parse_or(&lookup, "PUSHER_PORT", 6001),
                tls: parse_or(&lookup, "PUSHER_TLS", false),
                auth_url: lookup("BROADCAST_AUTH_URL")
                    .unwrap_or_else(|| "http://127.0.0.1:8000/broadcasting/auth".to_string()),
                reconnect_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "CHAT_RECONNECT_DELAY_MS",
                    5000,
                )),
                auth_timeout: http_timeout,
            });

        Self {
            api_url,
            http_timeout,
            poll_interval: Duration::from_millis(parse_or(&lookup, "CHAT_POLL_INTERVAL_MS", 3000)),
            max_body_chars: parse_or(&lookup, "CHAT_MAX_BODY_CHARS", MAX_BODY_CHARS),
            identity_ttl: Duration::from_secs(parse_or(&lookup, "CHAT_IDENTITY_TTL_SECS", 3600)),
            pusher,
        }
    }
}

fn parse_or<F, T>(lookup: &F, var: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(var)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
