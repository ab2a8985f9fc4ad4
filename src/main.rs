use std::sync::Arc;

use tracing::{error, info};

use lobbyd::{Config, LobbyServer, SessionRegistry};

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_validated(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = lobbyd::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        lobbyd::logging::init_console_only(&config.logging.level);
    }

    info!("lobbyd starting");
    info!(
        "Supported client version {}, max {} connections",
        config.lobby.supported_version, config.server.max_connections
    );

    let server = match LobbyServer::bind(&config.server).await {
        Ok(server) => server,
        Err(e) => {
            error!(
                "Failed to bind {}:{}: {}",
                config.server.host, config.server.port, e
            );
            std::process::exit(1);
        }
    };

    if let Err(e) = server.serve(SessionRegistry::new(), Arc::new(config)).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
