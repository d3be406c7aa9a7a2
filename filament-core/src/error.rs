//! Error Types
//!
//! Failures reported by user-supplied effect and scope bodies. The engine
//! never unwinds these through `set`/`get`; they are routed to the system's
//! error hook together with the originating node.

use crate::graph::NodeId;

/// An error produced by an effect or effect-scope body.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A failure described by a plain message.
    #[error("{0}")]
    Message(String),

    /// A failure carrying an arbitrary underlying error.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + 'static>),
}

impl Error {
    /// Create an error from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<Box<dyn std::error::Error + 'static>> for Error {
    fn from(source: Box<dyn std::error::Error + 'static>) -> Self {
        Self::Other(source)
    }
}

/// Callback invoked with the originating node whenever an effect or scope
/// body fails.
pub type ErrorHook = Box<dyn Fn(NodeId, &Error)>;
