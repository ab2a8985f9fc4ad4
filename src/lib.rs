//! lobbyd - a chat-only multiplayer game lobby relay
//!
//! Clients speak the gzip-framed WML lobby protocol over TCP. The server
//! performs the handshake, checks the client version, logs users in by
//! name and relays whispers and room messages between them. Hosting games
//! is refused.

pub mod config;
pub mod error;
pub mod lobby;
pub mod logging;
pub mod server;
pub mod wml;

pub use config::Config;
pub use error::{LobbyError, Result};
pub use lobby::LobbyCommand;
pub use server::{
    FrameError, LobbyServer, LobbySession, Outbound, SessionHandle, SessionInfo, SessionRegistry,
    SessionState,
};
