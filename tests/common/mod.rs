//! Test helpers for lobby integration tests.
//!
//! Provides TestClient, TestServer, and helper functions for driving the
//! lobby over real TCP connections.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;

use lobbyd::config::{Config, LobbyConfig, LoggingConfig, ServerConfig};
use lobbyd::server::frame;
use lobbyd::wml::{self, Data, Tag};
use lobbyd::{LobbyServer, SessionRegistry};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a client must stay quiet to count as silent.
pub const SILENCE: Duration = Duration::from_millis(300);

/// Client version reported by test clients.
pub const CLIENT_VERSION: &str = "1.14.7";

const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Test client speaking the lobby wire protocol.
pub struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    /// Connect to the server at the given address.
    pub async fn connect(addr: SocketAddr) -> TestResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self { stream })
    }

    /// Send raw bytes to the server.
    pub async fn send_raw(&mut self, data: &[u8]) -> TestResult {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Perform the raw handshake and return the server's answer.
    pub async fn handshake(&mut self) -> TestResult<u32> {
        self.send_raw(&[0, 0, 0, 0]).await?;
        let mut buf = [0u8; 4];
        timeout(DEFAULT_TIMEOUT, self.stream.read_exact(&mut buf)).await??;
        Ok(u32::from_be_bytes(buf))
    }

    /// Send one WML document as a frame.
    pub async fn send_wml(&mut self, text: &str) -> TestResult {
        frame::write_frame(&mut self.stream, text.as_bytes(), MAX_FRAME_SIZE).await?;
        Ok(())
    }

    /// Receive the next frame as a parsed document.
    pub async fn recv_doc(&mut self) -> TestResult<Data> {
        let payload = timeout(
            DEFAULT_TIMEOUT,
            frame::read_frame(&mut self.stream, MAX_FRAME_SIZE),
        )
        .await??;
        Ok(wml::parse(&payload)?)
    }

    /// Receive the next frame, which must hold a single tag.
    pub async fn recv_tag(&mut self) -> TestResult<Tag> {
        Ok(self.recv_doc().await?.into_tag()?)
    }

    /// Receive a single tag and check its name.
    pub async fn expect_tag(&mut self, name: &str) -> TestResult<Tag> {
        let tag = self.recv_tag().await?;
        if tag.name != name {
            return Err(format!("expected [{}], got [{}]", name, tag.name).into());
        }
        Ok(tag)
    }

    /// Check that nothing arrives for a while.
    pub async fn expect_silence(&mut self) -> TestResult {
        match timeout(SILENCE, frame::read_frame(&mut self.stream, MAX_FRAME_SIZE)).await {
            Err(_) => Ok(()),
            Ok(Ok(payload)) => Err(format!(
                "unexpected frame: {}",
                String::from_utf8_lossy(&payload)
            )
            .into()),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    /// Check that the server closes the connection without sending more.
    pub async fn expect_closed(&mut self) -> TestResult {
        let mut buf = [0u8; 1];
        match timeout(DEFAULT_TIMEOUT, self.stream.read(&mut buf)).await? {
            Ok(0) | Err(_) => Ok(()),
            Ok(_) => Err("server sent data instead of closing".into()),
        }
    }

    /// Answer the version request.
    pub async fn send_version(&mut self, version: &str) -> TestResult {
        self.expect_tag("version").await?;
        self.send_wml(&format!("[version]\nversion=\"{}\"\n[/version]\n", version))
            .await
    }

    /// Answer the login request.
    pub async fn send_login(&mut self, username: &str) -> TestResult {
        self.expect_tag("mustlogin").await?;
        self.send_wml(&format!("[login]\nusername=\"{}\"\n[/login]\n", username))
            .await
    }

    /// Perform the whole login sequence and return the lobby snapshot.
    ///
    /// Consumes the join acknowledgement, the snapshot and the welcome
    /// message.
    pub async fn login(&mut self, username: &str) -> TestResult<Data> {
        let ack = self.handshake().await?;
        if ack != frame::HANDSHAKE_ACK {
            return Err(format!("unexpected handshake answer {}", ack).into());
        }
        self.send_version(CLIENT_VERSION).await?;
        self.send_login(username).await?;
        self.expect_tag("join_lobby").await?;
        let snapshot = self.recv_doc().await?;
        let welcome = self.expect_tag("message").await?;
        if welcome.data.read_string("sender")? != "server" {
            return Err("welcome message not sent by server".into());
        }
        Ok(snapshot)
    }

    /// Send a whisper claiming to come from `sender`.
    pub async fn whisper(&mut self, sender: &str, receiver: &str, text: &str) -> TestResult {
        self.send_wml(&format!(
            "[whisper]\nsender=\"{}\"\nreceiver=\"{}\"\nmessage=\"{}\"\n[/whisper]\n",
            sender,
            receiver,
            wml::escape(text)
        ))
        .await
    }

    /// Send a room message claiming to come from `sender`.
    pub async fn message(&mut self, sender: &str, room: &str, text: &str) -> TestResult {
        self.send_wml(&format!(
            "[message]\nsender=\"{}\"\nroom=\"{}\"\nmessage=\"{}\"\n[/message]\n",
            sender,
            room,
            wml::escape(text)
        ))
        .await
    }
}

/// Test server lifecycle management.
/// Runs the server in a separate thread with its own tokio runtime.
pub struct TestServer {
    addr: SocketAddr,
    registry: SessionRegistry,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _thread_handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    /// Create a new test server with the default test configuration.
    pub async fn new() -> TestResult<Self> {
        Self::with_config(test_config()).await
    }

    /// Create a new test server with custom configuration.
    ///
    /// The listener is bound inside the server thread's runtime and the
    /// address is sent back once it is listening.
    pub async fn with_config(config: Config) -> TestResult<Self> {
        let registry = SessionRegistry::new();
        let server_registry = registry.clone();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (addr_tx, addr_rx) = oneshot::channel::<Result<SocketAddr, String>>();

        let thread_handle = thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("Failed to create runtime");

            rt.block_on(async move {
                let server = match LobbyServer::bind(&config.server).await {
                    Ok(server) => server,
                    Err(e) => {
                        let _ = addr_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let addr = server.local_addr().map_err(|e| e.to_string());
                let _ = addr_tx.send(addr);

                tokio::select! {
                    _ = shutdown_rx => {}
                    _ = server.serve(server_registry, Arc::new(config)) => {}
                }
            });
        });

        let addr = addr_rx.await??;

        Ok(Self {
            addr,
            registry,
            shutdown_tx: Some(shutdown_tx),
            _thread_handle: Some(thread_handle),
        })
    }

    /// Get the local address of the server.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the registry the server routes through.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Connect a new client.
    pub async fn connect(&self) -> TestResult<TestClient> {
        TestClient::connect(self.addr).await
    }

    /// Connect and log in a new client, waiting until it is a lobby member.
    pub async fn login(&self, username: &str) -> TestResult<TestClient> {
        let mut client = self.connect().await?;
        client.login(username).await?;
        self.wait_for_member(username).await?;
        Ok(client)
    }

    /// Log in several clients in order.
    ///
    /// Each earlier client's join notification for every later client is
    /// consumed, so all returned clients start with nothing pending.
    pub async fn login_all(&self, usernames: &[&str]) -> TestResult<Vec<TestClient>> {
        let mut clients: Vec<TestClient> = Vec::new();
        for username in usernames {
            let client = self.login(username).await?;
            for earlier in &mut clients {
                earlier.expect_tag("gamelist_diff").await?;
            }
            clients.push(client);
        }
        Ok(clients)
    }

    /// Wait until `username` is a lobby member.
    pub async fn wait_for_member(&self, username: &str) -> TestResult {
        self.wait_until(|names| names.iter().any(|n| n == username))
            .await
    }

    /// Wait until `username` is gone from the registry.
    pub async fn wait_for_departure(&self, username: &str) -> TestResult {
        let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
        while self.registry.find_by_username(username).await.is_some() {
            if tokio::time::Instant::now() >= deadline {
                return Err(format!("{} still registered", username).into());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    /// Wait until the registry holds `count` sessions.
    pub async fn wait_for_count(&self, count: usize) -> TestResult {
        let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
        while self.registry.count().await != count {
            if tokio::time::Instant::now() >= deadline {
                return Err(format!(
                    "expected {} sessions, have {}",
                    count,
                    self.registry.count().await
                )
                .into());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    async fn wait_until<F>(&self, predicate: F) -> TestResult
    where
        F: Fn(&[String]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
        loop {
            let names = self.registry.lobby_usernames().await;
            if predicate(&names) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(format!("lobby never reached expected state: {:?}", names).into());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop the server.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Create a test configuration.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_connections: 16,
            ..ServerConfig::default()
        },
        lobby: LobbyConfig::default(),
        logging: LoggingConfig {
            level: "warn".to_string(),
            file: String::new(),
        },
    }
}

/// Names of the `[user]` entries in a lobby snapshot, in order.
pub fn snapshot_users(snapshot: &Data) -> Vec<String> {
    snapshot
        .children()
        .iter()
        .filter(|tag| tag.name == "user")
        .filter_map(|tag| tag.data.read_string("name").ok())
        .collect()
}
