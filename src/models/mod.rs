pub mod conversations;
pub mod messages;

pub use conversations::{ConversationId, CurrentUser, Role};
pub use messages::{Message, OutgoingMessage, ProvisionalKey, SenderProfile};
