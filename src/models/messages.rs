use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default upper bound on a message body, in characters.
pub const MAX_BODY_CHARS: usize = 500;

/// Correlates a provisional message with its server-confirmed counterpart.
///
/// Always the positive magnitude of the provisional message's negative id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProvisionalKey(pub i64);

impl ProvisionalKey {
    /// The negative placeholder id shown while the message is unconfirmed.
    pub fn placeholder_id(self) -> i64 {
        -self.0
    }
}

/// Display info the backend attaches to a message's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// One chat message, either provisional (negative id) or confirmed by the
/// backend (positive id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub body: String,
    pub sender_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisional_key: Option<ProvisionalKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<SenderProfile>,
}

impl Message {
    /// Build the optimistic entry shown before the backend answers.
    pub fn provisional(
        key: ProvisionalKey,
        body: String,
        sender_id: i64,
        created_at: DateTime<Utc>,
        client_message_id: Uuid,
    ) -> Self {
        Self {
            id: key.placeholder_id(),
            body,
            sender_id,
            created_at,
            provisional_key: Some(key),
            client_message_id: Some(client_message_id),
            sender: Some(SenderProfile {
                name: "You".to_string(),
                avatar: None,
            }),
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional_key.is_some()
    }

    /// Whether `confirmed` is the server's record of this provisional entry.
    ///
    /// A client id echoed by the server is authoritative. Without one, the
    /// best available signal is same sender and same body.
    pub fn is_confirmed_by(&self, confirmed: &Message) -> bool {
        if !self.is_provisional() {
            return false;
        }
        match (self.client_message_id, confirmed.client_message_id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => self.sender_id == confirmed.sender_id && self.body == confirmed.body,
        }
    }
}

// ── Validation ──

/// A message body the compose field should not submit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message body is empty")]
    Empty,
    #[error("message body is {len} characters, the limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Trim `raw` and check it against the length limit. Returns the text that
/// should actually be sent.
pub fn validate_body(raw: &str, max_chars: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(ValidationError::TooLong { len, max: max_chars });
    }

    Ok(trimmed.to_string())
}

// ── DTOs ──

/// Request body for `POST /conversations/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub body: String,
    pub client_message_id: Uuid,
}

/// A message as it arrives from the backend, before validation.
///
/// Older endpoints call the body `message`; `created_at` is sometimes absent.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: Option<i64>,
    #[serde(alias = "message", alias = "content")]
    pub body: Option<String>,
    pub sender_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_message_id: Option<Uuid>,
    #[serde(default)]
    pub sender: Option<SenderProfile>,
}

/// Single-message responses come bare or wrapped in `message` / `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageEnvelope {
    Wrapped { message: WireMessage },
    Data { data: WireMessage },
    Bare(WireMessage),
}

impl MessageEnvelope {
    pub fn into_inner(self) -> WireMessage {
        match self {
            Self::Wrapped { message } | Self::Data { data: message } | Self::Bare(message) => {
                message
            }
        }
    }
}

/// Message lists come bare or wrapped in `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageListEnvelope {
    Data { data: Vec<WireMessage> },
    Bare(Vec<WireMessage>),
}

impl MessageListEnvelope {
    pub fn into_inner(self) -> Vec<WireMessage> {
        match self {
            Self::Data { data } | Self::Bare(data) => data,
        }
    }
}

/// Why a backend payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("message payload is missing `{0}`")]
    MissingField(&'static str),
    #[error("message id {0} is not a server-assigned id")]
    InvalidId(i64),
    #[error("message {0} has an empty body")]
    EmptyBody(i64),
}

impl TryFrom<WireMessage> for Message {
    type Error = PayloadError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let id = wire.id.ok_or(PayloadError::MissingField("id"))?;
        if id <= 0 {
            return Err(PayloadError::InvalidId(id));
        }

        let body = wire.body.ok_or(PayloadError::MissingField("body"))?;
        if body.trim().is_empty() {
            return Err(PayloadError::EmptyBody(id));
        }

        let sender_id = wire.sender_id.ok_or(PayloadError::MissingField("sender_id"))?;

        Ok(Self {
            id,
            body,
            sender_id,
            // Missing timestamps are stamped on receipt.
            created_at: wire.created_at.unwrap_or_else(Utc::now),
            provisional_key: None,
            client_message_id: wire.client_message_id,
            sender: wire.sender,
        })
    }
}
