//! Session registry and message routing.
//!
//! The registry is the only state shared between connections. It resolves
//! usernames to sessions and fans chat and presence events out to lobby
//! members. Deliveries go to each session's mailbox; the session's own
//! writer task puts them on the wire.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::session::{SessionHandle, SessionState};

/// Registry slot for one connection.
struct SessionEntry {
    handle: SessionHandle,
    peer_addr: SocketAddr,
    username: Option<String>,
    state: SessionState,
    connected_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_lobby_member(&self) -> bool {
        self.state == SessionState::LobbyMember
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.handle.id(),
            peer_addr: self.peer_addr,
            username: self.username.clone(),
            state: self.state,
            connected_at: self.connected_at,
        }
    }
}

/// Information about a session for external queries.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session ID.
    pub id: Uuid,
    /// Peer address.
    pub peer_addr: SocketAddr,
    /// Username once logged in.
    pub username: Option<String>,
    /// Current state.
    pub state: SessionState,
    /// When the connection was accepted.
    pub connected_at: DateTime<Utc>,
}

/// Registry of live sessions, in accept order.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<Vec<SessionEntry>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection.
    pub async fn register(&self, handle: SessionHandle, peer_addr: SocketAddr) {
        let mut sessions = self.sessions.write().await;
        let id = handle.id();
        sessions.push(SessionEntry {
            handle,
            peer_addr,
            username: None,
            state: SessionState::Handshaking,
            connected_at: Utc::now(),
        });
        debug!("Registered session {} (total: {})", id, sessions.len());
    }

    /// Record the login name of a session.
    ///
    /// Fails if the session already has a name or another live session
    /// holds this one.
    pub async fn claim_username(&self, id: Uuid, username: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions
            .iter()
            .any(|e| e.username.as_deref() == Some(username))
        {
            return false;
        }
        match sessions.iter_mut().find(|e| e.handle.id() == id) {
            Some(entry) if entry.username.is_none() => {
                entry.username = Some(username.to_string());
                true
            }
            _ => false,
        }
    }

    /// Mark a session as a lobby member.
    pub async fn promote(&self, id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.iter_mut().find(|e| e.handle.id() == id) {
            entry.state = SessionState::LobbyMember;
        }
    }

    /// Remove a session. Returns true if it was registered.
    pub async fn unregister(&self, id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|e| e.handle.id() != id);
        let removed = sessions.len() != before;
        if removed {
            debug!("Unregistered session {} (total: {})", id, sessions.len());
        }
        removed
    }

    /// Get the number of registered sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Get information about all sessions.
    pub async fn list(&self) -> Vec<SessionInfo> {
        self.sessions.read().await.iter().map(SessionEntry::info).collect()
    }

    /// Find the first session logged in under `username`, in any state.
    pub async fn find_by_username(&self, username: &str) -> Option<SessionInfo> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|e| e.username.as_deref() == Some(username))
            .map(SessionEntry::info)
    }

    /// Usernames of lobby members, in registration order.
    pub async fn lobby_usernames(&self) -> Vec<String> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|e| e.is_lobby_member())
            .filter_map(|e| e.username.clone())
            .collect()
    }

    /// Deliver a whisper from `sender` to the session named `receiver`.
    ///
    /// Returns false when nobody by that name is connected; the whisper is
    /// then dropped.
    pub async fn whisper(&self, sender: &str, receiver: &str, text: &str) -> bool {
        let target = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .find(|e| e.username.as_deref() == Some(receiver))
                .map(|e| e.handle.clone())
        };

        match target {
            Some(handle) => handle.whisper(sender, receiver, text),
            None => false,
        }
    }

    /// Send a room message to every lobby member except the originator.
    ///
    /// Returns the number of sessions it was delivered to.
    pub async fn broadcast_message(
        &self,
        origin: Uuid,
        sender: &str,
        room: &str,
        text: &str,
    ) -> usize {
        self.lobby_peers(origin)
            .await
            .iter()
            .filter(|handle| handle.message(sender, room, text))
            .count()
    }

    /// Announce a new lobby member to every other lobby member.
    ///
    /// Returns the number of sessions it was delivered to.
    pub async fn broadcast_lobby_join(&self, origin: Uuid, username: &str) -> usize {
        self.lobby_peers(origin)
            .await
            .iter()
            .filter(|handle| handle.lobby_joined(username))
            .count()
    }

    /// Snapshot of lobby member handles, excluding `origin`.
    async fn lobby_peers(&self, origin: Uuid) -> Vec<SessionHandle> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|e| e.is_lobby_member() && e.handle.id() != origin)
            .map(|e| e.handle.clone())
            .collect()
    }
}
