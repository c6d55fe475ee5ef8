pub mod protocol;
pub mod pusher;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::{ConversationId, Message};

pub use pusher::PusherChannel;

/// Whether pushed messages are currently arriving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Subscription not confirmed yet.
    #[default]
    Unknown,
    Live,
    /// Realtime unavailable; the session re-fetches on a timer.
    Polling,
}

impl ConnectionState {
    pub fn is_live(self) -> bool {
        self == Self::Live
    }

    /// Passive status indicator for the chat header.
    pub fn indicator(self) -> &'static str {
        match self {
            Self::Unknown => "… Connecting",
            Self::Live => "● Live",
            Self::Polling => "○ Polling",
        }
    }
}

/// What a realtime channel reports to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A confirmed message pushed by the server.
    Message(Message),
    State(ConnectionState),
}

/// Why a realtime connection attempt ended. Never surfaced to the user: the
/// channel reports `ConnectionState::Polling` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("channel authorization failed: {0}")]
    Auth(String),
    #[error("subscription rejected: {0}")]
    Rejected(String),
    /// `pusher:error` with a connection-level code.
    #[error("server refused connection ({code}): {message}")]
    Refused { code: u16, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection closed")]
    Closed,
}

impl ChannelError {
    /// Pusher codes 4000-4099: reconnecting with the same settings will fail
    /// again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Refused { code: 4000..=4099, .. })
    }
}

/// Name of the per-conversation broadcast channel.
pub fn channel_name(conversation_id: ConversationId) -> String {
    format!("chat.{conversation_id}")
}

/// A per-conversation push subscription.
pub trait RealtimeChannel: Send + Sync + 'static {
    /// Start delivering events for `conversation_id` into `events`. Errors are
    /// reported as `ChannelEvent::State(ConnectionState::Polling)`, never
    /// returned.
    fn subscribe(
        &self,
        conversation_id: ConversationId,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Subscription;
}

/// Handle to a live subscription. Released on `unsubscribe` or drop.
#[derive(Debug, Default)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Tie the subscription's lifetime to the task delivering its events.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A handle with nothing behind it.
    pub fn detached() -> Self {
        Self { task: None }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Release the channel. Safe to call any number of times.
    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Releasing realtime subscription");
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Channel used when no broadcast server is configured: reports `Polling`
/// straight away so the session falls back to re-fetching.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRealtime;

impl RealtimeChannel for NoRealtime {
    fn subscribe(
        &self,
        _conversation_id: ConversationId,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Subscription {
        let _ = events.send(ChannelEvent::State(ConnectionState::Polling));
        Subscription::detached()
    }
}
