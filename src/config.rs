//! Configuration module for lobbyd.

use serde::Deserialize;
use std::path::Path;

use crate::{LobbyError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Largest compressed frame accepted from or sent to a client, in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: u32,
    /// Outbound messages queued per session before further ones are dropped.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    15000
}

fn default_max_connections() -> usize {
    256
}

fn default_max_frame_size() -> u32 {
    16 * 1024 * 1024
}

fn default_mailbox_capacity() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            max_frame_size: default_max_frame_size(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

/// Lobby behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LobbyConfig {
    /// Accepted client version, as `major.minor`.
    #[serde(default = "default_supported_version")]
    pub supported_version: String,
    /// Server chat message sent to every user after login.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    /// Server chat message sent when a client tries to host a game.
    #[serde(default = "default_hosting_rejection")]
    pub hosting_rejection: String,
}

fn default_supported_version() -> String {
    "1.14".to_string()
}

fn default_welcome_message() -> String {
    "Welcome to the lobby server!".to_string()
}

fn default_hosting_rejection() -> String {
    "This server disallows any self-hosted games.".to_string()
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            supported_version: default_supported_version(),
            welcome_message: default_welcome_message(),
            hosting_rejection: default_hosting_rejection(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty for console only.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Lobby configuration.
    #[serde(default)]
    pub lobby: LobbyConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(LobbyError::Io)?;
        Self::parse(&content)
    }

    /// Load a configuration file and validate it.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| LobbyError::Config(format!("parse error: {e}")))
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `port`, `max_connections`, `max_frame_size` or `mailbox_capacity`
    ///   is zero
    /// - `supported_version` is not of the form `major.minor`
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(LobbyError::Config(
                "server.port must be non-zero".to_string(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(LobbyError::Config(
                "server.max_connections must be greater than zero".to_string(),
            ));
        }
        if self.server.max_frame_size == 0 {
            return Err(LobbyError::Config(
                "server.max_frame_size must be greater than zero".to_string(),
            ));
        }
        if self.server.mailbox_capacity == 0 {
            return Err(LobbyError::Config(
                "server.mailbox_capacity must be greater than zero".to_string(),
            ));
        }

        let parts: Vec<&str> = self.lobby.supported_version.split('.').collect();
        let well_formed = parts.len() == 2
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if !well_formed {
            return Err(LobbyError::Config(format!(
                "lobby.supported_version must look like \"1.14\", got {:?}",
                self.lobby.supported_version
            )));
        }
        Ok(())
    }
}
