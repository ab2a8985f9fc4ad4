//! Lobby sessions.
//!
//! One [`LobbySession`] runs per accepted connection. It performs the raw
//! handshake, the version and login exchange, then relays lobby commands
//! until the connection fails. Output from the session itself and from other
//! sessions goes through a mailbox drained by a dedicated writer task, so the
//! socket is only ever written from one place.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::frame::{self, FrameError};
use super::outbound::Outbound;
use super::registry::SessionRegistry;
use crate::config::Config;
use crate::error::{LobbyError, Result};
use crate::lobby::{messages, LobbyCommand};
use crate::wml::{self, Data};

/// Session state representing the current phase of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake, version check or login still in progress.
    Handshaking,
    /// Logged in and visible in the lobby.
    LobbyMember,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Handshaking
    }
}

/// Delivery endpoint of a session, shared with the registry.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    mailbox: Sender<Outbound>,
}

impl SessionHandle {
    /// Create a handle feeding the given mailbox.
    pub fn new(id: Uuid, mailbox: Sender<Outbound>) -> Self {
        Self { id, mailbox }
    }

    /// Get the session ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue output for the client.
    ///
    /// Returns false if the session is gone or its mailbox is full; output
    /// that does not fit is dropped.
    pub fn send(&self, out: Outbound) -> bool {
        match self.mailbox.try_send(out) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Session {} mailbox full, dropping output", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Deliver a whisper addressed to this session's user.
    pub fn whisper(&self, sender: &str, receiver: &str, text: &str) -> bool {
        self.send(Outbound::tags(messages::whisper(sender, receiver, text)))
    }

    /// Deliver a room chat message.
    pub fn message(&self, sender: &str, room: &str, text: &str) -> bool {
        self.send(Outbound::tags(messages::message(sender, room, text)))
    }

    /// Tell the client that `username` joined the lobby.
    pub fn lobby_joined(&self, username: &str) -> bool {
        self.send(Outbound::tag(messages::lobby_join_diff(username)))
    }

    /// Resolves once the writer side of the mailbox has gone away.
    pub async fn closed(&self) {
        self.mailbox.closed().await
    }
}

/// A lobby connection.
pub struct LobbySession {
    peer_addr: SocketAddr,
    state: SessionState,
    username: Option<String>,
    handle: SessionHandle,
    registry: SessionRegistry,
    config: Arc<Config>,
    writer: Option<JoinHandle<()>>,
}

impl LobbySession {
    /// Create a session whose output goes to `mailbox`.
    pub fn new(
        peer_addr: SocketAddr,
        registry: SessionRegistry,
        config: Arc<Config>,
        mailbox: Sender<Outbound>,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!("Created new session {} for {}", id, peer_addr);

        Self {
            peer_addr,
            state: SessionState::Handshaking,
            username: None,
            handle: SessionHandle::new(id, mailbox),
            registry,
            config,
            writer: None,
        }
    }

    /// Serve one accepted connection until it ends.
    ///
    /// The session is registered for its whole lifetime and removed from the
    /// registry however it terminates.
    pub async fn handle_connection(
        stream: TcpStream,
        peer_addr: SocketAddr,
        registry: SessionRegistry,
        config: Arc<Config>,
    ) -> Result<()> {
        let (mailbox, outbox) = mpsc::channel(config.server.mailbox_capacity);
        let mut session = LobbySession::new(peer_addr, registry.clone(), config, mailbox);
        let id = session.id();
        registry.register(session.handle(), peer_addr).await;

        let result = session.run(stream, outbox).await;

        registry.unregister(id).await;
        let username = session.username.clone().unwrap_or_default();
        session.shutdown().await;

        match &result {
            Ok(()) => info!("Session {} ({}) closed", id, username),
            Err(e) => info!("Session {} ({}) from {} ended: {}", id, username, peer_addr, e),
        }
        result
    }

    /// Get the session ID.
    pub fn id(&self) -> Uuid {
        self.handle.id()
    }

    /// Get a delivery handle for this session.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    fn max_frame_size(&self) -> u32 {
        self.config.server.max_frame_size
    }

    async fn run(
        &mut self,
        mut stream: TcpStream,
        outbox: Receiver<Outbound>,
    ) -> Result<()> {
        accept_handshake(&mut stream).await?;

        let (mut reader, writer) = stream.into_split();
        self.writer = Some(tokio::spawn(write_loop(
            writer,
            outbox,
            self.max_frame_size(),
            self.id(),
        )));

        self.login(&mut reader).await?;
        self.dispatch_loop(&mut reader).await
    }

    /// Release the mailbox and wait for the writer to flush and close.
    async fn shutdown(self) {
        let LobbySession { handle, writer, .. } = self;
        drop(handle);
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!("Writer task failed: {}", e);
            }
        }
    }

    fn send(&self, out: Outbound) -> Result<()> {
        if self.handle.send(out) {
            Ok(())
        } else {
            Err(LobbyError::MailboxClosed)
        }
    }

    async fn read_payload(&self, reader: &mut OwnedReadHalf) -> Result<Vec<u8>> {
        tokio::select! {
            payload = frame::read_frame(reader, self.max_frame_size()) => Ok(payload?),
            _ = self.handle.closed() => Err(LobbyError::MailboxClosed),
        }
    }

    async fn read_document(&self, reader: &mut OwnedReadHalf) -> Result<Data> {
        let payload = self.read_payload(reader).await?;
        Ok(wml::parse(&payload)?)
    }

    /// Version check, login and lobby entry.
    async fn login(&mut self, reader: &mut OwnedReadHalf) -> Result<()> {
        self.send(Outbound::tag(messages::version_request()))?;
        let reply = self.read_document(reader).await?;
        let version = reply.read_string("version.version")?;
        let supported = &self.config.lobby.supported_version;
        if major_version(&version) != *supported {
            return Err(LobbyError::IncompatibleVersion {
                reported: version,
                supported: supported.clone(),
            });
        }
        debug!("Session {} client version {}", self.id(), version);

        self.send(Outbound::tag(messages::must_login()))?;
        let reply = self.read_document(reader).await?;
        let username = reply.read_string("login.username")?;
        if !is_valid_username(&username) {
            return Err(LobbyError::InvalidUsername(username));
        }
        if !self.registry.claim_username(self.id(), &username).await {
            return Err(LobbyError::UsernameTaken(username));
        }
        info!(
            "Session {} logged in as {} from {}",
            self.id(),
            username,
            self.peer_addr
        );
        self.username = Some(username.clone());

        self.send(Outbound::tag(messages::join_lobby()))?;
        let mut roster = self.registry.lobby_usernames().await;
        roster.push(username.clone());
        self.send(Outbound::tag(messages::lobby_snapshot(&roster)))?;

        let notified = self.registry.broadcast_lobby_join(self.id(), &username).await;
        debug!("Announced {} to {} lobby members", username, notified);

        let welcome = messages::server_message(&self.config.lobby.welcome_message);
        self.send(Outbound::tags(welcome))?;

        self.enter_lobby().await;
        Ok(())
    }

    async fn enter_lobby(&mut self) {
        if self.state == SessionState::Handshaking {
            debug!(
                "Session {} state changed: {:?} -> {:?}",
                self.id(),
                self.state,
                SessionState::LobbyMember
            );
            self.state = SessionState::LobbyMember;
            self.registry.promote(self.id()).await;
        }
    }

    /// Steady-state loop. Only transport failures end it.
    async fn dispatch_loop(&mut self, reader: &mut OwnedReadHalf) -> Result<()> {
        while self.state == SessionState::LobbyMember {
            let payload = match self.read_payload(reader).await {
                Ok(payload) => payload,
                Err(LobbyError::Frame(e)) if !e.is_fatal() => {
                    debug!("Session {} dropped unreadable frame: {}", self.id(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let command = match LobbyCommand::parse(&payload) {
                Ok(command) => command,
                Err(e) => {
                    debug!("Session {} dropped malformed message: {}", self.id(), e);
                    continue;
                }
            };

            self.dispatch(command).await?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, command: LobbyCommand) -> Result<()> {
        let username = self.username.clone().unwrap_or_default();
        if !command.is_sent_by(&username) {
            debug!(
                "Session {} ({}) sent {} with a forged sender",
                self.id(),
                username,
                command
            );
            return Ok(());
        }

        match command {
            LobbyCommand::Whisper {
                receiver, message, ..
            } => {
                if !self.registry.whisper(&username, &receiver, &message).await {
                    debug!("Whisper from {} to unknown user {}", username, receiver);
                }
            }
            LobbyCommand::Message { room, message, .. } => {
                let delivered = self
                    .registry
                    .broadcast_message(self.id(), &username, &room, &message)
                    .await;
                debug!("Message from {} in {} reached {}", username, room, delivered);
            }
            LobbyCommand::CreateGame => {
                info!("Rejected game hosting attempt by {}", username);
                self.send(Outbound::tag(messages::leave_game()))?;
                let rejection = messages::server_message(&self.config.lobby.hosting_rejection);
                self.send(Outbound::tags(rejection))?;
            }
            LobbyCommand::Ignored(name) => {
                debug!("Session {} ignored [{}]", self.id(), name);
            }
            LobbyCommand::Unknown(name) => {
                debug!("Session {} sent unknown tag [{}]", self.id(), name);
            }
        }
        Ok(())
    }
}

/// Check the raw client handshake and acknowledge it.
async fn accept_handshake(stream: &mut TcpStream) -> Result<()> {
    let bytes = frame::read_handshake(stream).await?;
    if bytes != [0u8; frame::HANDSHAKE_LEN] {
        return Err(LobbyError::BadHandshake(bytes));
    }
    frame::write_handshake_ack(stream).await?;
    Ok(())
}

/// Drain the mailbox onto the socket until every sender is gone or a
/// write fails.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbox: Receiver<Outbound>,
    max_frame_size: u32,
    id: Uuid,
) {
    while let Some(out) = outbox.recv().await {
        for payload in out.into_payloads() {
            match frame::write_frame(&mut writer, &payload, max_frame_size).await {
                Ok(()) => {}
                Err(e @ FrameError::TooLarge { .. }) => {
                    warn!("Session {} skipped outbound frame: {}", id, e);
                }
                Err(e) => {
                    debug!("Session {} write failed: {}", id, e);
                    return;
                }
            }
        }
    }
}

/// The `major.minor` prefix of a dotted version string.
pub fn major_version(version: &str) -> String {
    version.split('.').take(2).collect::<Vec<_>>().join(".")
}

fn is_valid_username(username: &str) -> bool {
    !username.trim().is_empty() && !username.chars().any(char::is_control)
}
