//! InkRoom relay server binary.

use inkroom_server::{AppState, ServerConfig};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkroom_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let state = Arc::new(AppState::new(config.channel_capacity));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("InkRoom relay server listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/ws", config.addr);

    inkroom_server::serve(listener, state).await?;
    Ok(())
}
