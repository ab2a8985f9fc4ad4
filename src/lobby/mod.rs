//! Lobby protocol vocabulary.
//!
//! This module provides the lobby-level pieces that sit on top of WML:
//! - Inbound command parsing (whisper, message, create_game, ...)
//! - Outbound tag builders for chat, presence and roster updates
//! - Splitting long chat text into wire-safe segments

mod command;
pub mod messages;
mod split;

pub use command::LobbyCommand;
pub use split::{split_message, MAX_SEGMENT_CHARS};
