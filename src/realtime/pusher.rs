use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::auth::token::{TokenProvider, bearer_token};
use crate::config::PusherConfig;
use crate::models::ConversationId;
use crate::realtime::protocol::{
    ChannelAuthRequest, ChannelAuthResponse, ClientFrame, ServerEvent, parse_frame,
};
use crate::realtime::{
    ChannelError, ChannelEvent, ConnectionState, RealtimeChannel, Subscription, channel_name,
};

const PROTOCOL_VERSION: u8 = 7;

/// Realtime channel speaking the Pusher protocol (as served by Laravel
/// WebSockets / Reverb / Soketi) on the private `chat.{id}` channel.
#[derive(Clone)]
pub struct PusherChannel {
    config: PusherConfig,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl PusherChannel {
    pub fn new(config: PusherConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, ChannelError> {
        let http = reqwest::Client::builder()
            .timeout(config.auth_timeout)
            .build()
            .map_err(|e| ChannelError::Connect(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    pub fn socket_url(&self) -> String {
        let scheme = if self.config.tls { "wss" } else { "ws" };
        format!(
            "{scheme}://{}:{}/app/{}?protocol={PROTOCOL_VERSION}&client=brandlink-chat&version={}",
            self.config.host,
            self.config.port,
            self.config.app_key,
            env!("CARGO_PKG_VERSION"),
        )
    }

    /// Ask the backend to sign our subscription to a private channel.
    async fn authorize(&self, socket_id: &str, channel: &str) -> Result<String, ChannelError> {
        let token = bearer_token(self.tokens.as_ref()).map_err(|e| ChannelError::Auth(e.to_string()))?;

        debug!("Authorizing {channel} for socket {socket_id}");

        let response = self
            .http
            .post(&self.config.auth_url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&ChannelAuthRequest {
                socket_id,
                channel_name: channel,
            })
            .send()
            .await
            .map_err(|e| ChannelError::Auth(format!("Failed to reach auth endpoint: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Auth(format!("HTTP {status}")));
        }

        let signed: ChannelAuthResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Auth(format!("Invalid auth response: {e}")))?;

        Ok(signed.auth)
    }

    /// Keep a subscription up until the subscriber goes away, reconnecting
    /// after every failure.
    async fn run(self, conversation_id: ConversationId, events: mpsc::UnboundedSender<ChannelEvent>) {
        loop {
            let error = match self.connect_once(conversation_id, &events).await {
                Ok(()) => return,
                Err(e) => e,
            };
            warn!("Realtime channel for conversation {conversation_id}: {error}");

            if events
                .send(ChannelEvent::State(ConnectionState::Polling))
                .is_err()
            {
                return;
            }

            if error.is_fatal() {
                warn!("Not reconnecting conversation {conversation_id}, staying on polling");
                return;
            }

            tokio::time::sleep(self.config.reconnect_delay).await;

            if events.is_closed() {
                return;
            }
        }
    }

    /// One socket lifetime. `Ok` means the subscriber is gone and we should stop.
    async fn connect_once(
        &self,
        conversation_id: ConversationId,
        events: &mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<(), ChannelError> {
        let url = self.socket_url();
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let channel = format!("private-{}", channel_name(conversation_id));
        debug!("Connected to {}, waiting for handshake", self.config.host);

        while let Some(frame) = stream.next().await {
            let text = match frame.map_err(|e| ChannelError::Connect(e.to_string()))? {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => return Err(ChannelError::Closed),
                _ => continue,
            };

            let event = match parse_frame(text.as_str()) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Ignoring frame: {e}");
                    continue;
                }
            };

            let reply = match event {
                ServerEvent::ConnectionEstablished { socket_id } => {
                    let auth = self.authorize(&socket_id, &channel).await?;
                    Some(ClientFrame::Subscribe {
                        channel: channel.clone(),
                        auth: Some(auth),
                    })
                }
                ServerEvent::SubscriptionSucceeded { .. } => {
                    info!("Subscribed to {channel}");
                    if events.send(ChannelEvent::State(ConnectionState::Live)).is_err() {
                        return Ok(());
                    }
                    None
                }
                ServerEvent::SubscriptionError(reason) => {
                    return Err(ChannelError::Rejected(reason));
                }
                ServerEvent::Error {
                    code: Some(code @ 4000..=4299),
                    message,
                } => {
                    return Err(ChannelError::Refused { code, message });
                }
                ServerEvent::Error { code, message } => {
                    warn!("Pusher error {code:?}: {message}");
                    None
                }
                ServerEvent::Ping => Some(ClientFrame::Pong {}),
                ServerEvent::MessageSent(message) => {
                    debug!("Message {} received via realtime channel", message.id);
                    if events.send(ChannelEvent::Message(message)).is_err() {
                        return Ok(());
                    }
                    None
                }
                ServerEvent::Other(name) => {
                    debug!("Unhandled event {name}");
                    None
                }
            };

            if let Some(frame) = reply {
                let json = serde_json::to_string(&frame)
                    .map_err(|e| ChannelError::Protocol(e.to_string()))?;
                sink.send(WsMessage::Text(json.into()))
                    .await
                    .map_err(|e| ChannelError::Connect(e.to_string()))?;
            }
        }

        Err(ChannelError::Closed)
    }
}

impl RealtimeChannel for PusherChannel {
    fn subscribe(
        &self,
        conversation_id: ConversationId,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Subscription {
        let channel = self.clone();
        Subscription::from_task(tokio::spawn(channel.run(conversation_id, events)))
    }
}
