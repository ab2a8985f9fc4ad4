//! Error types for lobbyd.

use thiserror::Error;

use crate::server::FrameError;
use crate::wml::WmlError;

/// Common error type for lobbyd.
#[derive(Error, Debug)]
pub enum LobbyError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing or compression error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Malformed or incomplete WML.
    #[error("WML error: {0}")]
    Wml(#[from] WmlError),

    /// The raw connection handshake was not four zero bytes.
    #[error("invalid handshake: {0:?}")]
    BadHandshake([u8; 4]),

    /// The client runs an unsupported version.
    #[error("incompatible client version {reported} (server supports {supported})")]
    IncompatibleVersion { reported: String, supported: String },

    /// The login name is unusable.
    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    /// The login name belongs to another live session.
    #[error("username already in use: {0}")]
    UsernameTaken(String),

    /// The session's outbound mailbox is gone (writer failed or stopped).
    #[error("session mailbox closed")]
    MailboxClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for lobbyd operations.
pub type Result<T> = std::result::Result<T, LobbyError>;
