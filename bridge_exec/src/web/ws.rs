//! WebSocket handler: pumps a connection's telemetry snapshots to the client.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::conn_mgr::{ConnId, ConnectionManager};

/// Handle a single WebSocket connection.
///
/// Runs until the client disconnects or the connection's queue is closed, then closes the
/// connection in the manager.
pub async fn handle_ws(socket: WebSocket, conns: ConnectionManager, id: ConnId) {
    let mut queue = match conns.open(id) {
        Ok(rx) => rx,
        Err(e) => {
            warn!("Could not open connection {}: {}", id, e);
            conns.close(id).ok();
            return;
        }
    };

    pump(socket, &mut queue, id).await;

    // Already gone if the manager tore the connection down
    conns.close(id).ok();
}

async fn pump(socket: WebSocket, queue: &mut mpsc::Receiver<String>, id: ConnId) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Forward snapshots to the client
            snapshot = queue.recv() => {
                match snapshot {
                    Some(s) => {
                        if ws_tx.send(Message::Text(s)).await.is_err() {
                            debug!("Connection {}: send failed", id);
                            break;
                        }
                    }
                    None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            // Handle incoming messages from the client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(t))) => info!("Connection {} says: {}", id, t),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("Connection {}: receive error: {}", id, e);
                        break;
                    }
                    // Pings are answered by axum
                    _ => (),
                }
            }
        }
    }
}
