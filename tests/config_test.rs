use std::collections::HashMap;
use std::time::Duration;

use brandlink_chat::ChatConfig;
use brandlink_chat::chat::SessionSettings;

fn config_from(vars: &[(&str, &str)]) -> ChatConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ChatConfig::from_lookup(|name| vars.get(name).cloned())
}

#[test]
fn test_defaults() {
    let config = config_from(&[]);

    assert_eq!(config, ChatConfig::default());
    assert_eq!(config.api_url, "http://127.0.0.1:8000/api/v1");
    assert_eq!(config.poll_interval, Duration::from_secs(3));
    assert_eq!(config.max_body_chars, 500);
    assert!(config.pusher.is_none());
}

#[test]
fn test_overrides() {
    let config = config_from(&[
        ("CHAT_API_URL", "https://api.brandlink.test/v1/"),
        ("CHAT_POLL_INTERVAL_MS", "1500"),
        ("CHAT_HTTP_TIMEOUT_SECS", "5"),
        ("CHAT_MAX_BODY_CHARS", "1000"),
        ("CHAT_IDENTITY_TTL_SECS", "60"),
    ]);

    assert_eq!(config.api_url, "https://api.brandlink.test/v1");
    assert_eq!(config.poll_interval, Duration::from_millis(1500));
    assert_eq!(config.http_timeout, Duration::from_secs(5));
    assert_eq!(config.max_body_chars, 1000);
    assert_eq!(config.identity_ttl, Duration::from_secs(60));

    let settings = SessionSettings::from(&config);
    assert_eq!(settings.poll_interval, Duration::from_millis(1500));
    assert_eq!(settings.max_body_chars, 1000);
}

#[test]
fn test_unparsable_values_fall_back() {
    let config = config_from(&[
        ("CHAT_POLL_INTERVAL_MS", "soon"),
        ("CHAT_MAX_BODY_CHARS", "-1"),
    ]);

    assert_eq!(config.poll_interval, Duration::from_secs(3));
    assert_eq!(config.max_body_chars, 500);
}

#[test]
fn test_pusher_requires_app_key() {
    assert!(config_from(&[("PUSHER_HOST", "ws.brandlink.test")]).pusher.is_none());
    assert!(config_from(&[("PUSHER_APP_KEY", "")]).pusher.is_none());

    let pusher = config_from(&[("PUSHER_APP_KEY", "brandlink")]).pusher.unwrap();
    assert_eq!(pusher.app_key, "brandlink");
    assert_eq!(pusher.host, "127.0.0.1");
    assert_eq!(pusher.port, 6001);
    assert!(!pusher.tls);
    assert_eq!(pusher.reconnect_delay, Duration::from_secs(5));
    assert_eq!(pusher.auth_timeout, Duration::from_secs(15));
}

#[test]
fn test_pusher_overrides() {
    let pusher = config_from(&[
        ("PUSHER_APP_KEY", "brandlink"),
        ("PUSHER_HOST", "ws.brandlink.test"),
        ("PUSHER_PORT", "443"),
        ("PUSHER_TLS", "true"),
        ("BROADCAST_AUTH_URL", "https://api.brandlink.test/broadcasting/auth"),
        ("CHAT_RECONNECT_DELAY_MS", "250"),
        ("CHAT_HTTP_TIMEOUT_SECS", "4"),
    ])
    .pusher
    .unwrap();

    assert_eq!(pusher.host, "ws.brandlink.test");
    assert_eq!(pusher.port, 443);
    assert!(pusher.tls);
    assert_eq!(pusher.auth_url, "https://api.brandlink.test/broadcasting/auth");
    assert_eq!(pusher.reconnect_delay, Duration::from_millis(250));
    assert_eq!(pusher.auth_timeout, Duration::from_secs(4));
}

#[test]
fn test_pusher_socket_url() {
    use brandlink_chat::auth::StaticToken;
    use brandlink_chat::realtime::PusherChannel;
    use std::sync::Arc;

    let pusher = config_from(&[
        ("PUSHER_APP_KEY", "brandlink"),
        ("PUSHER_HOST", "ws.brandlink.test"),
        ("PUSHER_PORT", "443"),
        ("PUSHER_TLS", "true"),
    ])
    .pusher
    .unwrap();

    let channel = PusherChannel::new(pusher, Arc::new(StaticToken::none())).unwrap();
    let url = channel.socket_url();

    assert!(url.starts_with("wss://ws.brandlink.test:443/app/brandlink?protocol=7&client=brandlink-chat"));
}
