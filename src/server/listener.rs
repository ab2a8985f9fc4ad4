//! TCP listener for the lobby server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, info_span, warn, Instrument};

use super::registry::SessionRegistry;
use super::session::LobbySession;
use crate::config::{Config, ServerConfig};
use crate::{LobbyError, Result};

/// Pause after a failed accept, e.g. when the process is out of descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Listening socket plus a fixed pool of connection slots.
pub struct LobbyServer {
    listener: TcpListener,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl LobbyServer {
    /// Bind to `host:port` from the server config.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        info!(
            "Lobby listening on {} ({} connection slots)",
            listener.local_addr()?,
            config.max_connections
        );

        Ok(Self {
            listener,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Connections currently holding a slot.
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.slots.available_permits()
    }

    /// Wait for a free slot, then for the next client.
    ///
    /// While every slot is taken new clients stay in the kernel backlog.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit)> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| LobbyError::Io(std::io::Error::other("connection slots closed")))?;

        let (stream, peer_addr) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("TCP_NODELAY not set for {}: {}", peer_addr, e);
        }

        Ok((stream, peer_addr, ConnectionPermit { _permit: permit }))
    }

    /// Accept clients forever, running one [`LobbySession`] task per
    /// connection against the shared `registry`.
    pub async fn serve(self, registry: SessionRegistry, config: Arc<Config>) -> Result<()> {
        loop {
            let (stream, peer_addr, permit) = match self.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            debug!(
                "Accepted {} ({}/{} slots in use)",
                peer_addr,
                self.active_connections(),
                self.max_connections
            );

            let registry = registry.clone();
            let config = Arc::clone(&config);
            tokio::spawn(
                async move {
                    // Outcome is logged by the session.
                    let _ = LobbySession::handle_connection(stream, peer_addr, registry, config)
                        .await;
                    drop(permit);
                }
                .instrument(info_span!("conn", peer = %peer_addr)),
            );
        }
    }
}

/// A held connection slot, released on drop.
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
