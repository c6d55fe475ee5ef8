use thiserror::Error;

use crate::realtime::ChannelError;
use crate::transport::TransportError;

/// Top-level error for callers that drive the whole client (the CLI).
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
