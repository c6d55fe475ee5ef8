//! Decoding of REST payloads and Pusher frames, and HTTP status mapping.
use reqwest::StatusCode;
use serde_json::json;

use brandlink_chat::models::messages::{
    MessageEnvelope, MessageListEnvelope, PayloadError, WireMessage,
};
use brandlink_chat::models::Message;
use brandlink_chat::realtime::protocol::{ClientFrame, ServerEvent, is_message_sent, parse_frame};
use brandlink_chat::realtime::{ChannelError, channel_name};
use brandlink_chat::transport::TransportError;
use brandlink_chat::transport::http::status_error;

fn decode(value: serde_json::Value) -> Result<Message, PayloadError> {
    let envelope: MessageEnvelope = serde_json::from_value(value).unwrap();
    Message::try_from(envelope.into_inner())
}

// ── REST payloads ──

#[test]
fn test_message_envelopes() {
    let bare = decode(json!({
        "id": 42,
        "body": "hello",
        "sender_id": 1,
        "created_at": "2024-05-01T10:00:00Z"
    }))
    .unwrap();
    assert_eq!(bare.id, 42);
    assert_eq!(bare.body, "hello");
    assert!(!bare.is_provisional());

    let wrapped = decode(json!({
        "message": { "id": 43, "body": "hi", "sender_id": 2, "created_at": "2024-05-01T10:01:00Z" }
    }))
    .unwrap();
    assert_eq!(wrapped.id, 43);

    let data = decode(json!({
        "data": { "id": 44, "body": "hey", "sender_id": 2, "created_at": "2024-05-01T10:02:00Z" }
    }))
    .unwrap();
    assert_eq!(data.id, 44);
}

#[test]
fn test_legacy_body_field_and_sender_profile() {
    let message = decode(json!({
        "id": 7,
        "message": "see you friday",
        "sender_id": 3,
        "created_at": "2024-05-01T10:00:00Z",
        "sender": { "name": "Acme Drinks", "avatar": "https://cdn.example.com/acme.png" }
    }))
    .unwrap();

    assert_eq!(message.body, "see you friday");
    let sender = message.sender.unwrap();
    assert_eq!(sender.name, "Acme Drinks");
    assert_eq!(sender.avatar.as_deref(), Some("https://cdn.example.com/acme.png"));
}

#[test]
fn test_missing_timestamp_is_stamped_on_receipt() {
    let before = chrono::Utc::now();
    let message = decode(json!({ "id": 8, "body": "ok", "sender_id": 1 })).unwrap();
    assert!(message.created_at >= before);
}

#[test]
fn test_invalid_payloads_are_rejected() {
    assert_eq!(
        decode(json!({ "body": "ok", "sender_id": 1 })),
        Err(PayloadError::MissingField("id"))
    );
    assert_eq!(
        decode(json!({ "id": -3, "body": "ok", "sender_id": 1 })),
        Err(PayloadError::InvalidId(-3))
    );
    assert_eq!(
        decode(json!({ "id": 9, "body": "  ", "sender_id": 1 })),
        Err(PayloadError::EmptyBody(9))
    );
    assert_eq!(
        decode(json!({ "id": 9, "body": "ok" })),
        Err(PayloadError::MissingField("sender_id"))
    );

    let err: TransportError = PayloadError::MissingField("id").into();
    assert!(matches!(err, TransportError::Malformed(_)));
}

#[test]
fn test_message_list_envelopes() {
    let items = json!([
        { "id": 1, "body": "a", "sender_id": 1, "created_at": "2024-05-01T10:00:00Z" },
        { "id": 2, "body": "b", "sender_id": 2, "created_at": "2024-05-01T10:01:00Z" }
    ]);

    let bare: MessageListEnvelope = serde_json::from_value(items.clone()).unwrap();
    let wrapped: MessageListEnvelope = serde_json::from_value(json!({ "data": items })).unwrap();

    let bare: Vec<WireMessage> = bare.into_inner();
    let wrapped: Vec<WireMessage> = wrapped.into_inner();
    assert_eq!(bare.len(), 2);
    assert_eq!(wrapped.len(), 2);
    assert_eq!(wrapped[1].id, Some(2));
}

// ── HTTP status mapping ──

#[test]
fn test_status_errors() {
    assert_eq!(
        status_error(StatusCode::UNAUTHORIZED, r#"{"message":"Unauthenticated."}"#),
        TransportError::Unauthorized("Unauthenticated.".to_string())
    );
    assert!(matches!(
        status_error(StatusCode::UNAUTHORIZED, ""),
        TransportError::Unauthorized(_)
    ));
    assert_eq!(
        status_error(StatusCode::FORBIDDEN, r#"{"error":"Not a participant"}"#),
        TransportError::Server {
            status: 403,
            message: "Not a participant".to_string()
        }
    );
    assert_eq!(
        status_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
        TransportError::Server {
            status: 502,
            message: String::new()
        }
    );
}

#[test]
fn test_user_messages() {
    let server = TransportError::Server {
        status: 422,
        message: "The body may not be greater than 500 characters.".to_string(),
    };
    assert_eq!(server.user_message(), "The body may not be greater than 500 characters.");
    assert_eq!(
        TransportError::Network("timeout".to_string()).user_message(),
        "Failed to reach the server. Check your connection."
    );
}

// ── Pusher frames ──

#[test]
fn test_connection_established() {
    let frame = r#"{"event":"pusher:connection_established","data":"{\"socket_id\":\"123.456\",\"activity_timeout\":30}"}"#;
    assert_eq!(
        parse_frame(frame).unwrap(),
        ServerEvent::ConnectionEstablished {
            socket_id: "123.456".to_string()
        }
    );

    let missing = r#"{"event":"pusher:connection_established","data":"{}"}"#;
    assert!(matches!(parse_frame(missing), Err(ChannelError::Protocol(_))));
}

#[test]
fn test_subscription_frames() {
    let ok = r#"{"event":"pusher_internal:subscription_succeeded","channel":"private-chat.3","data":"{}"}"#;
    assert_eq!(
        parse_frame(ok).unwrap(),
        ServerEvent::SubscriptionSucceeded {
            channel: "private-chat.3".to_string()
        }
    );

    let rejected = r#"{"event":"pusher:subscription_error","channel":"private-chat.3","data":{"type":"AuthError","error":"Forbidden","status":403}}"#;
    assert_eq!(
        parse_frame(rejected).unwrap(),
        ServerEvent::SubscriptionError("Forbidden".to_string())
    );
}

#[test]
fn test_ping_and_error_frames() {
    assert_eq!(
        parse_frame(r#"{"event":"pusher:ping","data":{}}"#).unwrap(),
        ServerEvent::Ping
    );
    assert_eq!(
        parse_frame(r#"{"event":"pusher:error","data":{"code":4001,"message":"App key not in this cluster"}}"#)
            .unwrap(),
        ServerEvent::Error {
            code: Some(4001),
            message: "App key not in this cluster".to_string()
        }
    );
}

#[test]
fn test_message_sent_frame() {
    let data = json!({
        "message": { "id": 42, "message": "hello", "sender_id": 1, "created_at": "2024-05-01T10:00:00Z" }
    })
    .to_string();
    let frame = json!({
        "event": "App\\Events\\MessageSent",
        "channel": "private-chat.3",
        "data": data,
    })
    .to_string();

    match parse_frame(&frame).unwrap() {
        ServerEvent::MessageSent(message) => {
            assert_eq!(message.id, 42);
            assert_eq!(message.body, "hello");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let broken = json!({ "event": "MessageSent", "data": { "id": 0 } }).to_string();
    assert!(matches!(parse_frame(&broken), Err(ChannelError::Protocol(_))));
}

#[test]
fn test_other_frames_and_garbage() {
    assert_eq!(
        parse_frame(r#"{"event":"client-typing","data":{}}"#).unwrap(),
        ServerEvent::Other("client-typing".to_string())
    );
    assert!(matches!(parse_frame("not json"), Err(ChannelError::Protocol(_))));
}

#[test]
fn test_event_name_matching() {
    assert!(is_message_sent("MessageSent"));
    assert!(is_message_sent("App\\Events\\MessageSent"));
    assert!(is_message_sent(".MessageSent"));
    assert!(!is_message_sent("MessageSentAndRead"));
    assert!(!is_message_sent("pusher:ping"));
}

#[test]
fn test_client_frames() {
    let subscribe = ClientFrame::Subscribe {
        channel: format!("private-{}", channel_name(3)),
        auth: Some("app-key:signature".to_string()),
    };
    assert_eq!(
        serde_json::to_value(&subscribe).unwrap(),
        json!({
            "event": "pusher:subscribe",
            "data": { "channel": "private-chat.3", "auth": "app-key:signature" }
        })
    );

    let public = ClientFrame::Subscribe {
        channel: channel_name(3),
        auth: None,
    };
    assert_eq!(
        serde_json::to_value(&public).unwrap(),
        json!({ "event": "pusher:subscribe", "data": { "channel": "chat.3" } })
    );

    assert_eq!(
        serde_json::to_value(ClientFrame::Pong {}).unwrap(),
        json!({ "event": "pusher:pong", "data": {} })
    );
}

#[test]
fn test_fatal_refusals() {
    let refused = |code| ChannelError::Refused {
        code,
        message: String::new(),
    };
    assert!(refused(4001).is_fatal());
    assert!(refused(4099).is_fatal());
    assert!(!refused(4100).is_fatal());
    assert!(!refused(4201).is_fatal());
    assert!(!ChannelError::Closed.is_fatal());
    assert!(!ChannelError::Rejected("Forbidden".to_string()).is_fatal());
}
