pub mod http;

use std::future::Future;

use thiserror::Error;

use crate::auth::token::TokenError;
use crate::models::messages::PayloadError;
use crate::models::{ConversationId, Message, OutgoingMessage};

pub use http::HttpTransport;

/// Failure of a single REST call. Nothing here is retried by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never got an HTTP answer (DNS, connect, timeout, IO).
    #[error("network error: {0}")]
    Network(String),
    /// The backend answered with a 4xx/5xx status.
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    /// Missing or expired credentials, detected locally or by the backend.
    #[error("not authenticated: {0}")]
    Unauthorized(String),
    /// The backend answered 2xx with a body that failed validation.
    #[error("malformed server payload: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Short text suitable for a toast next to a retry button.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Failed to reach the server. Check your connection.".to_string(),
            Self::Server { message, .. } if !message.is_empty() => message.clone(),
            Self::Server { .. } | Self::Malformed(_) => {
                "The server could not handle the request. Please try again.".to_string()
            }
            Self::Unauthorized(_) => "Your session has expired. Please log in again.".to_string(),
        }
    }
}

impl From<TokenError> for TransportError {
    fn from(e: TokenError) -> Self {
        Self::Unauthorized(e.to_string())
    }
}

impl From<PayloadError> for TransportError {
    fn from(e: PayloadError) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// REST operations the chat session needs from the backend.
pub trait ChatTransport: Send + Sync + 'static {
    /// All messages of a conversation, oldest first.
    fn fetch_messages(
        &self,
        conversation_id: ConversationId,
    ) -> impl Future<Output = Result<Vec<Message>, TransportError>> + Send;

    /// Post a message and return the server-confirmed record.
    fn send_message(
        &self,
        conversation_id: ConversationId,
        outgoing: OutgoingMessage,
    ) -> impl Future<Output = Result<Message, TransportError>> + Send;
}
