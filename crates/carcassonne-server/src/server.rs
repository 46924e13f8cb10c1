//! WebSocket transport.
//!
//! Each accepted socket gets a reader loop and a writer task. The reader
//! forwards text frames to the hub; the writer drains the connection's bounded
//! outbound queue onto the socket. Neither touches room state.

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::hub::HubHandle;
use crate::protocol::Outbound;

/// Bind the configured address and serve until the listener fails
pub async fn run_server(config: &ServerConfig, hub: HubHandle) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!("Carcassonne server listening on {}", config.addr);

    serve(listener, hub, config.outbound_buffer).await
}

/// Accept connections from an already bound listener
pub async fn serve(listener: TcpListener, hub: HubHandle, outbound_buffer: usize) -> anyhow::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let hub = hub.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, hub, outbound_buffer).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    hub: HubHandle,
    outbound_buffer: usize,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let connection_id = Uuid::new_v4();
    info!(connection = %connection_id, "New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<Outbound>(outbound_buffer);
    hub.register(connection_id, tx)?;

    // Forward queued messages to the socket; ends when the hub drops the sender
    let send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let text = match serde_json::to_string(&outbound) {
                Ok(text) => text,
                Err(e) => {
                    error!(connection = %connection_id, "Failed to encode message: {e}");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if hub.inbound(connection_id, text).is_err() {
                    warn!(connection = %connection_id, "Hub stopped, dropping connection");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(connection = %connection_id, "Ignoring binary frame");
            }
            Ok(Message::Close(_)) => {
                info!(connection = %connection_id, "Client closing connection");
                break;
            }
            Err(e) => {
                warn!(connection = %connection_id, "WebSocket error: {e}");
                break;
            }
            // Ping/pong frames are answered by tungstenite
            _ => {}
        }
    }

    let _ = hub.unregister(connection_id);
    send_task.abort();

    info!(connection = %connection_id, "Connection closed");
    Ok(())
}
