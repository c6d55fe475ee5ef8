pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod realtime;
pub mod transport;

pub use chat::{ChatSession, ChatView, SessionEvent, SessionSettings};
pub use config::ChatConfig;
pub use error::ChatError;
