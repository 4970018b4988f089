use thiserror::Error;

/// Why a command on a [`crate::session::CommandSession`] did not get an answer.
///
/// Cloneable so that one transport failure can be handed to every request
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("failed to connect to {host}:{port}: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },

    #[error("connection error: {0}")]
    Transport(String),

    #[error("connection closed by device")]
    ConnectionClosed,

    #[error("session closed")]
    Closed,

    #[error("failed to encode command: {0}")]
    Encode(String),
}
