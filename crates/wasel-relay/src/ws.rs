//! WebSocket socket tasks: one writer, one reader per connection.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wasel_core::envelope::REGISTER;
use wasel_core::{Envelope, RegisterFrame};

use crate::connection::RelayConnection;
use crate::registry::ConnectionRegistry;

/// Drive an upgraded socket until either side closes it.
///
/// The writer task drains the connection's outbound queue and pings on the
/// heartbeat interval; the reader task parses inbound frames. Whichever
/// finishes first aborts the other, then the connection leaves the registry.
pub async fn handle_ws_connection(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    heartbeat: Duration,
) {
    let (conn, outbound) = registry.register();
    info!(conn_id = %conn.id, total = registry.count(), "websocket connected");

    let (ws_tx, mut ws_rx) = socket.split();

    let writer_conn = Arc::clone(&conn);
    let writer = tokio::spawn(write_loop(ws_tx, outbound, writer_conn, heartbeat));

    let reader_conn = Arc::clone(&conn);
    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => handle_frame(&reader_conn, text.as_str()),
                Ok(Message::Pong(_)) => reader_conn.record_pong(),
                Ok(Message::Close(_)) => {
                    debug!(conn_id = %reader_conn.id, "client sent close frame");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(conn_id = %reader_conn.id, error = %e, "websocket read error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    registry.unregister(&conn.id);
    info!(conn_id = %conn.id, total = registry.count(), "websocket disconnected");
}

async fn write_loop(
    mut ws_tx: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<String>>,
    conn: Arc<RelayConnection>,
    heartbeat: Duration,
) {
    let mut ping = tokio::time::interval(heartbeat);
    ping.tick().await; // first tick completes immediately
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = ws_tx.send(Message::Text(frame.as_str().into())).await {
                    debug!(conn_id = %conn.id, error = %e, "websocket write error");
                    break;
                }
            }
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Interpret one inbound text frame.
///
/// A `register` frame fills (or replaces) the connection's registration.
/// Other recognized tags arriving from a client are ignored, as are unknown
/// tags. Malformed frames are logged and dropped; the connection stays open.
fn handle_frame(conn: &RelayConnection, text: &str) {
    let envelope = match Envelope::parse(text) {
        Ok(e) => e,
        Err(e) => {
            warn!(conn_id = %conn.id, error = %e, "dropping malformed frame");
            return;
        }
    };
    match envelope.tag.as_str() {
        REGISTER => match RegisterFrame::parse(text) {
            Ok(frame) => {
                let registration = crate::connection::Registration::from(frame);
                info!(
                    conn_id = %conn.id,
                    role = ?registration.role,
                    subject = registration.subject.as_ref().map(|s| s.as_str()),
                    "connection registered"
                );
                conn.register(registration);
            }
            Err(e) => {
                warn!(conn_id = %conn.id, error = %e, "dropping malformed register frame");
            }
        },
        other => {
            debug!(conn_id = %conn.id, tag = other, "ignoring client frame");
        }
    }
}
