use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::auth::token::{TokenProvider, bearer_token};
use crate::config::ChatConfig;
use crate::models::conversations::{ConversationOpened, CurrentUserEnvelope, OpenConversation};
use crate::models::messages::{MessageEnvelope, MessageListEnvelope};
use crate::models::{ConversationId, CurrentUser, Message, OutgoingMessage};
use crate::transport::{ChatTransport, TransportError};

/// `ChatTransport` over the backend's HTTP+JSON API.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpTransport {
    pub fn new(config: &ChatConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// The token this transport would attach right now.
    pub fn bearer(&self) -> Result<String, TransportError> {
        Ok(bearer_token(self.tokens.as_ref())?)
    }

    /// Attach auth, send, and decode a JSON body. Status and decode failures
    /// are mapped onto `TransportError`.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let token = self.bearer()?;

        let response = request
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| TransportError::Malformed(e.to_string()))
    }

    /// `POST /conversations`: create or reuse the conversation with `user_id`.
    pub async fn open_conversation(&self, user_id: i64) -> Result<ConversationId, TransportError> {
        let request = self
            .client
            .post(self.url("/conversations"))
            .json(&OpenConversation { user_id });

        let opened: ConversationOpened = self.execute(request).await?;
        debug!("Opened conversation {} with user {user_id}", opened.conversation_id);
        Ok(opened.conversation_id)
    }

    /// `GET /user`: the account the bearer token belongs to.
    pub async fn current_user(&self) -> Result<CurrentUser, TransportError> {
        let envelope: CurrentUserEnvelope = self.execute(self.client.get(self.url("/user"))).await?;
        Ok(envelope.into_inner())
    }
}

impl ChatTransport for HttpTransport {
    /// GET /conversations/{id}/messages
    async fn fetch_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, TransportError> {
        let request = self
            .client
            .get(self.url(&format!("/conversations/{conversation_id}/messages")));

        let envelope: MessageListEnvelope = self.execute(request).await?;
        let messages = envelope
            .into_inner()
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Fetched {} messages for conversation {conversation_id}", messages.len());
        Ok(messages)
    }

    /// POST /conversations/{id}/messages
    async fn send_message(
        &self,
        conversation_id: ConversationId,
        outgoing: OutgoingMessage,
    ) -> Result<Message, TransportError> {
        let request = self
            .client
            .post(self.url(&format!("/conversations/{conversation_id}/messages")))
            .json(&outgoing);

        let envelope: MessageEnvelope = self.execute(request).await?;
        Ok(Message::try_from(envelope.into_inner())?)
    }
}

/// Map a non-2xx answer, pulling a human message out of `{"message"}` or
/// `{"error"}` bodies when the backend sends one.
pub fn status_error(status: StatusCode, body: &str) -> TransportError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED => TransportError::Unauthorized(
            if message.is_empty() { format!("HTTP {status}") } else { message },
        ),
        _ => TransportError::Server {
            status: status.as_u16(),
            message,
        },
    }
}
