//! Carcassonne multiplayer game server.

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod directory;
mod hub;
mod protocol;
mod room;
mod server;
#[cfg(test)]
mod test_support;

use config::ServerConfig;
use directory::RoomDirectory;
use hub::{BotSchedule, Hub};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    info!(
        addr = %config.addr,
        bot_tick_ms = config.bot_tick.as_millis() as u64,
        outbound_buffer = config.outbound_buffer,
        idle_room_secs = config.idle_room_timeout.as_secs(),
        "Starting Carcassonne server..."
    );

    let directory = Arc::new(RoomDirectory::new());
    let hub = Hub::new(directory, config.idle_room_timeout);
    let (hub, hub_task) = hub.spawn(BotSchedule::Interval(config.bot_tick));

    tokio::select! {
        result = server::run_server(&config, hub.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            let _ = hub.shutdown();
            hub_task.await?;
            Ok(())
        }
    }
}
