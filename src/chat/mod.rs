pub mod poller;
pub mod reconciler;
pub mod session;
pub mod store;

pub use reconciler::{PendingSend, Reconciler, Reconciliation, SendRejected};
pub use session::{ChatSession, ChatView, SessionEvent, SessionSettings};
pub use store::MessageStore;
