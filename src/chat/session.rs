use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::chat::poller::PollTimer;
use crate::chat::reconciler::{Reconciler, SendRejected};
use crate::config::ChatConfig;
use crate::models::messages::MAX_BODY_CHARS;
use crate::models::{ConversationId, Message, ProvisionalKey};
use crate::realtime::{ChannelEvent, ConnectionState, RealtimeChannel};
use crate::transport::{ChatTransport, TransportError};

/// Tunables for one conversation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub max_body_chars: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            max_body_chars: MAX_BODY_CHARS,
        }
    }
}

impl From<&ChatConfig> for SessionSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_body_chars: config.max_body_chars,
        }
    }
}

/// Everything the conversation screen renders. Published as a whole on every
/// change, so a reader never sees a half-applied update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub conversation_id: ConversationId,
    pub messages: Vec<Message>,
    pub connection: ConnectionState,
    /// The initial load has not finished.
    pub loading: bool,
    pub pending_sends: usize,
}

/// Failures the user should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Fetching messages failed; what is on screen is unchanged.
    LoadFailed(TransportError),
    /// A send failed and its provisional entry was removed. `text` is what
    /// the user typed, to put back in the compose field for a retry.
    SendFailed { text: String, error: TransportError },
}

enum Command {
    Send(String),
}

enum Completion {
    Sent {
        key: ProvisionalKey,
        text: String,
        result: Result<Message, TransportError>,
    },
    Polled {
        requested_at: u64,
        result: Result<Vec<Message>, TransportError>,
    },
}

/// Handle to one open conversation.
///
/// A background task owns the conversation's `Reconciler` and applies every
/// update (user sends, REST completions, pushed messages, poll ticks) one at
/// a time. Closing or dropping the handle stops that task, which releases the
/// realtime subscription, the poll timer and any request still in flight.
pub struct ChatSession {
    conversation_id: ConversationId,
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ChatView>,
    task: Option<JoinHandle<()>>,
}

impl ChatSession {
    /// Subscribe, load the conversation and start processing. Must be called
    /// inside a tokio runtime.
    ///
    /// Sends issued before the initial load finishes are queued and applied
    /// once it has.
    pub fn open<T, C>(
        transport: Arc<T>,
        channel: Arc<C>,
        conversation_id: ConversationId,
        sender_id: i64,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>)
    where
        T: ChatTransport,
        C: RealtimeChannel,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reconciler = Reconciler::new(conversation_id, sender_id, settings.max_body_chars);
        let (view_tx, view_rx) = watch::channel(render(&reconciler, true));

        let driver = Driver {
            transport,
            reconciler,
            poller: PollTimer::new(settings.poll_interval),
            in_flight: JoinSet::new(),
            view: view_tx,
            events: event_tx,
            loading: true,
            poll_in_flight: false,
            poll_failing: false,
        };

        let task = tokio::spawn(driver.run(channel, command_rx));

        let session = Self {
            conversation_id,
            commands: command_tx,
            view: view_rx,
            task: Some(task),
        };

        (session, event_rx)
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Queue `text` for sending. Blank or over-long text is ignored. Returns
    /// `false` if the session has already stopped.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.commands.send(Command::Send(text.into())).is_ok()
    }

    /// The current snapshot.
    pub fn view(&self) -> ChatView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every snapshot change.
    pub fn watch(&self) -> watch::Receiver<ChatView> {
        self.view.clone()
    }

    /// Stop the session and wait until its resources are released.
    pub async fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn render(reconciler: &Reconciler, loading: bool) -> ChatView {
    ChatView {
        conversation_id: reconciler.conversation_id(),
        messages: reconciler.messages().to_vec(),
        connection: reconciler.connection(),
        loading,
        pending_sends: reconciler.pending_sends(),
    }
}

struct Driver<T> {
    transport: Arc<T>,
    reconciler: Reconciler,
    poller: PollTimer,
    in_flight: JoinSet<Completion>,
    view: watch::Sender<ChatView>,
    events: mpsc::UnboundedSender<SessionEvent>,
    loading: bool,
    poll_in_flight: bool,
    /// Suppresses repeated `LoadFailed` while polling keeps failing.
    poll_failing: bool,
}

impl<T: ChatTransport> Driver<T> {
    async fn run<C: RealtimeChannel>(
        mut self,
        channel: Arc<C>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let conversation_id = self.reconciler.conversation_id();

        // Subscribe before the first fetch so nothing pushed in between is lost.
        let (channel_tx, mut channel_rx) = mpsc::unbounded_channel();
        let mut subscription = channel.subscribe(conversation_id, channel_tx);

        match self.transport.fetch_messages(conversation_id).await {
            Ok(messages) => {
                info!("Loaded {} messages for conversation {conversation_id}", messages.len());
                self.reconciler.load_snapshot(messages);
            }
            Err(e) => {
                warn!("Failed to load conversation {conversation_id}: {e}");
                self.reconciler.mark_initialized();
                self.poll_failing = true;
                let _ = self.events.send(SessionEvent::LoadFailed(e));
            }
        }
        self.loading = false;
        self.sync_poller();
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Send(text)) => self.start_send(text),
                    // Every handle is gone.
                    None => break,
                },
                Some(event) = channel_rx.recv() => self.on_channel_event(event),
                _ = self.poller.tick() => self.start_poll(),
                Some(joined) = self.in_flight.join_next() => match joined {
                    Ok(completion) => self.on_completion(completion),
                    Err(e) => warn!("Chat request task failed: {e}"),
                },
            }
        }

        subscription.unsubscribe();
        self.poller.stop();
        self.in_flight.abort_all();
        debug!("Conversation {conversation_id} session stopped");
    }

    fn publish(&self) {
        self.view.send_replace(render(&self.reconciler, self.loading));
    }

    fn sync_poller(&mut self) {
        if self.poller.set_running(self.reconciler.wants_polling()) {
            if self.poller.is_running() {
                info!(
                    "Polling conversation {} every {:?}",
                    self.reconciler.conversation_id(),
                    self.poller.period()
                );
            } else {
                info!("Conversation {} is live, polling stopped", self.reconciler.conversation_id());
            }
        }
    }

    fn start_send(&mut self, text: String) {
        let pending = match self.reconciler.begin_send(&text) {
            Ok(pending) => pending,
            Err(SendRejected::Invalid(e)) => {
                debug!("Not sending: {e}");
                return;
            }
            Err(e @ SendRejected::NotReady) => {
                warn!("Not sending: {e}");
                return;
            }
        };
        self.publish();

        let transport = self.transport.clone();
        let conversation_id = self.reconciler.conversation_id();
        self.in_flight.spawn(async move {
            let result = transport.send_message(conversation_id, pending.outgoing).await;
            Completion::Sent {
                key: pending.key,
                text,
                result,
            }
        });
    }

    fn start_poll(&mut self) {
        if self.poll_in_flight {
            return;
        }
        self.poll_in_flight = true;

        let transport = self.transport.clone();
        let conversation_id = self.reconciler.conversation_id();
        let requested_at = self.reconciler.store().revision();
        self.in_flight.spawn(async move {
            let result = transport.fetch_messages(conversation_id).await;
            Completion::Polled {
                requested_at,
                result,
            }
        });
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message(message) => {
                let outcome = self.reconciler.on_incoming_message(message);
                debug!("Pushed message: {outcome:?}");
            }
            ChannelEvent::State(state) => {
                self.reconciler.set_connection(state);
                self.sync_poller();
            }
        }
        self.publish();
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Sent { key, text, result } => match result {
                Ok(confirmed) => {
                    let outcome = self.reconciler.confirm_send(key, confirmed);
                    debug!("Send confirmed: {outcome:?}");
                }
                Err(error) => {
                    warn!("Failed to send message: {error}");
                    // Already reconciled by a push means the server has it;
                    // handing the text back would invite a duplicate.
                    if self.reconciler.fail_send(key).is_some() {
                        let _ = self.events.send(SessionEvent::SendFailed { text, error });
                    }
                }
            },
            Completion::Polled {
                requested_at,
                result,
            } => {
                self.poll_in_flight = false;
                match result {
                    Ok(messages) => {
                        self.poll_failing = false;
                        self.reconciler.apply_poll(messages, requested_at);
                    }
                    Err(e) => {
                        warn!("Polling conversation {} failed: {e}", self.reconciler.conversation_id());
                        if !self.poll_failing {
                            self.poll_failing = true;
                            let _ = self.events.send(SessionEvent::LoadFailed(e));
                        }
                    }
                }
            }
        }
        self.publish();
    }
}
