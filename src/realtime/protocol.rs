use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Message;
use crate::models::messages::MessageEnvelope;
use crate::realtime::ChannelError;

/// Broadcast event carrying a newly stored chat message.
pub const MESSAGE_SENT_EVENT: &str = "MessageSent";

// ── Client -> Server frames ──

/// Frames the client sends over the Pusher socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    /// Join a channel. Private channels need the signature from the auth endpoint.
    #[serde(rename = "pusher:subscribe")]
    Subscribe {
        channel: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        auth: Option<String>,
    },
    /// Answer to a server `pusher:ping`.
    #[serde(rename = "pusher:pong")]
    Pong {},
}

// ── Server -> Client frames ──

/// Raw frame as received. `data` is usually a JSON document encoded as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFrame {
    pub event: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RawFrame {
    /// `data` decoded one level if it was sent as a string.
    pub fn payload(&self) -> Value {
        match &self.data {
            Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::String(s.clone())),
            Some(v) => v.clone(),
            None => Value::Null,
        }
    }
}

/// Server frames the channel acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    ConnectionEstablished { socket_id: String },
    SubscriptionSucceeded { channel: String },
    SubscriptionError(String),
    /// `pusher:error`. Codes 4000-4299 close the connection.
    Error { code: Option<u16>, message: String },
    Ping,
    MessageSent(Message),
    /// Anything else (client events, other broadcasts).
    Other(String),
}

/// Laravel broadcasts `App\Events\MessageSent`; bare `MessageSent` and
/// dot-prefixed names are also accepted.
pub fn is_message_sent(event: &str) -> bool {
    event == MESSAGE_SENT_EVENT
        || event
            .rsplit(['\\', '.'])
            .next()
            .is_some_and(|tail| tail == MESSAGE_SENT_EVENT)
}

/// Decode one text frame.
pub fn parse_frame(text: &str) -> Result<ServerEvent, ChannelError> {
    let frame: RawFrame = serde_json::from_str(text)
        .map_err(|e| ChannelError::Protocol(format!("Invalid frame: {e}")))?;
    let payload = frame.payload();

    let event = match frame.event.as_str() {
        "pusher:connection_established" => {
            let socket_id = payload["socket_id"]
                .as_str()
                .ok_or_else(|| ChannelError::Protocol("Missing 'socket_id'".to_string()))?
                .to_string();
            ServerEvent::ConnectionEstablished { socket_id }
        }
        "pusher_internal:subscription_succeeded" => ServerEvent::SubscriptionSucceeded {
            channel: frame.channel.clone().unwrap_or_default(),
        },
        "pusher:subscription_error" | "pusher_internal:subscription_error" => {
            let reason = payload["error"]
                .as_str()
                .or_else(|| payload["type"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| payload.to_string());
            ServerEvent::SubscriptionError(reason)
        }
        "pusher:error" => ServerEvent::Error {
            code: payload["code"].as_u64().and_then(|c| u16::try_from(c).ok()),
            message: payload["message"].as_str().unwrap_or_default().to_string(),
        },
        "pusher:ping" => ServerEvent::Ping,
        name if is_message_sent(name) => {
            let envelope: MessageEnvelope = serde_json::from_value(payload)
                .map_err(|e| ChannelError::Protocol(format!("Invalid MessageSent payload: {e}")))?;
            let message = Message::try_from(envelope.into_inner())
                .map_err(|e| ChannelError::Protocol(e.to_string()))?;
            ServerEvent::MessageSent(message)
        }
        other => ServerEvent::Other(other.to_string()),
    };

    Ok(event)
}

/// Body for the broadcast auth endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelAuthRequest<'a> {
    pub socket_id: &'a str,
    pub channel_name: &'a str,
}

/// Signature returned by the broadcast auth endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelAuthResponse {
    pub auth: String,
}
