use log::{error, info};
use std::sync::Arc;
use tiny_http::Server;

use iot_temp_sim::config::ReceiverConfig;
use iot_temp_sim::receiver::http::serve;
use iot_temp_sim::receiver::store::{InMemoryStore, ReadingStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ReceiverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let server = Server::http(&config.socket_addr())
        .map_err(|e| format!("failed to bind {}: {}", config.socket_addr(), e))?;
    let server = Arc::new(server);
    let store: Arc<dyn ReadingStore> = Arc::new(InMemoryStore::new());

    // Handle Ctrl+C gracefully: unblock the request loop so it drains out
    let unblock = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            unblock.unblock();
        }
    });

    let request_loop = server.clone();
    tokio::task::spawn_blocking(move || serve(request_loop, store, config)).await?;
    info!("Program terminated gracefully");

    Ok(())
}
