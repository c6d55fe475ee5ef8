use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::chat::store::MessageStore;
use crate::models::messages::{ValidationError, validate_body};
use crate::models::{ConversationId, Message, OutgoingMessage, ProvisionalKey};
use crate::realtime::ConnectionState;

/// Why `begin_send` produced nothing to post.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendRejected {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// The initial load has not finished yet.
    #[error("conversation is still loading")]
    NotReady,
}

/// A provisional entry waiting on its `POST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub key: ProvisionalKey,
    pub outgoing: OutgoingMessage,
}

/// Result of feeding a confirmed message into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The id was already present; nothing changed.
    Duplicate,
    /// The message took the place of this provisional entry.
    Replaced(ProvisionalKey),
    /// No provisional entry matched; the message was added.
    Inserted,
    /// The send's provisional entry was already gone; the response was dropped.
    Discarded,
}

/// Single source of truth for one conversation's messages.
///
/// Every method runs to completion without awaiting, so callers only need to
/// serialize calls, not lock.
#[derive(Debug, Clone)]
pub struct Reconciler {
    conversation_id: ConversationId,
    sender_id: i64,
    max_body_chars: usize,
    store: MessageStore,
    connection: ConnectionState,
    initialized: bool,
    last_provisional: i64,
}

impl Reconciler {
    pub fn new(conversation_id: ConversationId, sender_id: i64, max_body_chars: usize) -> Self {
        Self {
            conversation_id,
            sender_id,
            max_body_chars,
            store: MessageStore::new(),
            connection: ConnectionState::Unknown,
            initialized: false,
            last_provisional: 0,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn sender_id(&self) -> i64 {
        self.sender_id
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of sends still waiting on the server.
    pub fn pending_sends(&self) -> usize {
        self.store.provisional().count()
    }

    /// Install a full snapshot from `fetch_messages`. The first call also
    /// marks the conversation ready for sending.
    pub fn load_snapshot(&mut self, messages: Vec<Message>) -> Vec<ProvisionalKey> {
        self.initialized = true;
        self.store.replace_confirmed(messages)
    }

    /// Apply a polling snapshot requested at store revision `requested_at`.
    ///
    /// If the store moved on while the request was in flight, the snapshot is
    /// merged instead of replacing, so pushed or confirmed messages newer than
    /// the snapshot do not flicker out.
    pub fn apply_poll(&mut self, messages: Vec<Message>, requested_at: u64) -> Vec<ProvisionalKey> {
        if requested_at == self.store.revision() {
            self.load_snapshot(messages)
        } else {
            debug!(
                "Conversation {} changed during poll, merging snapshot",
                self.conversation_id
            );
            self.initialized = true;
            self.store.merge_confirmed(messages)
        }
    }

    /// Let sends through even though the initial load failed.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Record a connection state change. Returns whether it changed.
    pub fn set_connection(&mut self, state: ConnectionState) -> bool {
        if self.connection == state {
            return false;
        }
        debug!(
            "Conversation {} connection {:?} -> {:?}",
            self.conversation_id, self.connection, state
        );
        self.connection = state;
        true
    }

    /// Whether the polling fallback should be running.
    pub fn wants_polling(&self) -> bool {
        !self.connection.is_live()
    }

    pub fn begin_send(&mut self, raw: &str) -> Result<PendingSend, SendRejected> {
        self.begin_send_at(raw, Utc::now())
    }

    /// Validate `raw`, append a provisional entry stamped `now`, and return
    /// what must be posted.
    pub fn begin_send_at(&mut self, raw: &str, now: DateTime<Utc>) -> Result<PendingSend, SendRejected> {
        if !self.initialized {
            return Err(SendRejected::NotReady);
        }
        let body = validate_body(raw, self.max_body_chars)?;

        // Strictly increasing, so two sends in the same microsecond still
        // get distinct placeholder ids.
        let magnitude = now.timestamp_micros().max(self.last_provisional + 1);
        self.last_provisional = magnitude;
        let key = ProvisionalKey(magnitude);

        let client_message_id = Uuid::new_v4();
        self.store.push_provisional(Message::provisional(
            key,
            body.clone(),
            self.sender_id,
            now,
            client_message_id,
        ));

        Ok(PendingSend {
            key,
            outgoing: OutgoingMessage {
                body,
                client_message_id,
            },
        })
    }

    /// The `POST` for `key` succeeded with `confirmed`.
    pub fn confirm_send(&mut self, key: ProvisionalKey, confirmed: Message) -> Reconciliation {
        let Some(index) = self.store.position_of_key(key) else {
            if self.store.contains_id(confirmed.id) {
                debug!("Send {key:?} already reconciled, dropping response");
                return Reconciliation::Discarded;
            }
            // A push for another identical message took this entry's slot.
            self.store.insert_confirmed(confirmed);
            return Reconciliation::Inserted;
        };

        if self.store.contains_id(confirmed.id) {
            // A push already delivered this id against another provisional
            // entry with the same text; this one is now redundant.
            self.store.remove_provisional(key);
            return Reconciliation::Duplicate;
        }

        self.store.replace_at(index, confirmed);
        Reconciliation::Replaced(key)
    }

    /// The `POST` for `key` failed. Removes the provisional entry and returns
    /// it so the caller can restore the compose field.
    pub fn fail_send(&mut self, key: ProvisionalKey) -> Option<Message> {
        self.store.remove_provisional(key)
    }

    /// A confirmed message arrived over the realtime channel.
    pub fn on_incoming_message(&mut self, message: Message) -> Reconciliation {
        if self.store.contains_id(message.id) {
            return Reconciliation::Duplicate;
        }

        if let Some(index) = self.store.find_provisional_match(&message) {
            let replaced = self.store.replace_at(index, message);
            return replaced
                .provisional_key
                .map_or(Reconciliation::Inserted, Reconciliation::Replaced);
        }

        self.store.insert_confirmed(message);
        Reconciliation::Inserted
    }
}
