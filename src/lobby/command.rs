//! Inbound lobby commands.

use crate::wml::{self, Tag, WmlError};

/// A command received from a lobby member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyCommand {
    /// Private message to another user.
    Whisper {
        sender: String,
        receiver: String,
        message: String,
    },
    /// Chat message to a room.
    Message {
        sender: String,
        room: String,
        message: String,
    },
    /// Request to host a game.
    CreateGame,
    /// Recognised tag that needs no action.
    Ignored(String),
    /// Any other tag.
    Unknown(String),
}

/// Tags the lobby understands but does not act on.
const IGNORED_TAGS: &[&str] = &["refresh_lobby", "query", "nickserv", "join"];

impl LobbyCommand {
    /// Decode a frame payload into a command.
    ///
    /// The payload must be a WML document holding exactly one tag.
    pub fn parse(payload: &[u8]) -> Result<Self, WmlError> {
        let tag = wml::parse(payload)?.into_tag()?;
        Self::from_tag(&tag)
    }

    /// Interpret a tag. Missing required attributes are an error.
    pub fn from_tag(tag: &Tag) -> Result<Self, WmlError> {
        let data = &tag.data;
        let command = match tag.name.as_str() {
            "whisper" => LobbyCommand::Whisper {
                sender: data.read_string("sender")?,
                receiver: data.read_string("receiver")?,
                message: data.read_string("message")?,
            },
            "message" => LobbyCommand::Message {
                sender: data.read_string("sender")?,
                room: data.read_string("room")?,
                message: data.read_string("message")?,
            },
            "create_game" => LobbyCommand::CreateGame,
            name if IGNORED_TAGS.contains(&name) => LobbyCommand::Ignored(name.to_string()),
            name => LobbyCommand::Unknown(name.to_string()),
        };
        Ok(command)
    }

    /// Get the tag name this command came from.
    pub fn name(&self) -> &str {
        match self {
            LobbyCommand::Whisper { .. } => "whisper",
            LobbyCommand::Message { .. } => "message",
            LobbyCommand::CreateGame => "create_game",
            LobbyCommand::Ignored(name) | LobbyCommand::Unknown(name) => name,
        }
    }

    /// Whether the claimed sender, if any, matches the authenticated user.
    pub fn is_sent_by(&self, username: &str) -> bool {
        match self {
            LobbyCommand::Whisper { sender, .. } | LobbyCommand::Message { sender, .. } => {
                sender == username
            }
            _ => true,
        }
    }
}

impl std::fmt::Display for LobbyCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.name())
    }
}
