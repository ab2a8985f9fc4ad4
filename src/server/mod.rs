//! Lobby server module.
//!
//! This module provides the TCP listener, wire framing, per-connection
//! sessions and the registry that routes messages between them.

pub mod frame;
mod listener;
mod outbound;
mod registry;
mod session;

pub use frame::FrameError;
pub use listener::{ConnectionPermit, LobbyServer};
pub use outbound::Outbound;
pub use registry::{SessionInfo, SessionRegistry};
pub use session::{major_version, LobbySession, SessionHandle, SessionState};
