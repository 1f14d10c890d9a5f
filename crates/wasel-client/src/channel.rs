//! The notification channel connection — open, register, read, close.
//!
//! One connection per viewer context. [`open`] returns immediately; the
//! handshake runs on a spawned task, and every failure along the way degrades
//! to "no live updates" rather than surfacing to the owning page.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wasel_core::{ConnectionId, OrderId, RegisterFrame, Role};

use crate::dispatcher::UpdateDispatcher;
use crate::endpoint::Endpoint;
use crate::state::{ConnectionState, StateCell};

/// Everything a connection needs, captured immutably at open time.
///
/// Registration is derived from this and never changes for the life of the
/// connection — there is no way to re-register an open channel.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Where to connect (derived from the page origin).
    pub endpoint: Endpoint,
    /// Role of the viewer context.
    pub role: Role,
    /// Identifier of the viewing user (`"guest"` for anonymous sessions).
    pub user_id: String,
    /// The order this context watches, if any. Also the dispatch filter.
    pub subject: Option<OrderId>,
}

/// Handle to one live (or dead) notification connection.
///
/// Owned exclusively by the viewer context that opened it. Dropping the
/// handle closes the connection, so teardown happens on every exit path.
pub struct Connection {
    id: ConnectionId,
    state: Arc<StateCell>,
    cancel: CancellationToken,
}

impl Connection {
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Close the connection. Idempotent — closing a connection that is
    /// already closed (or never finished connecting) is a no-op.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(conn_id = %self.id, "closing notification channel");
        }
        self.cancel.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Open a notification connection for one viewer context.
///
/// Returns immediately with the connection in `Connecting`; the transport
/// handshake continues in the background. On open the registration frame is
/// sent exactly once (fire-and-forget). The `dispatcher`'s subject should be
/// the same as `config.subject` — [`open_with_capabilities`] guarantees that
/// and is the usual entry point.
pub fn open(config: ChannelConfig, dispatcher: UpdateDispatcher) -> Connection {
    let id = ConnectionId::new();
    let state = Arc::new(StateCell::new());
    let cancel = CancellationToken::new();

    let register = RegisterFrame::new(config.role, config.user_id.clone(), config.subject.clone());
    let url = config.endpoint.url();

    tokio::spawn(run_connection(
        id.clone(),
        url,
        register,
        dispatcher,
        Arc::clone(&state),
        cancel.clone(),
    ));

    Connection { id, state, cancel }
}

/// Open a connection, building the dispatcher from the injected capabilities.
///
/// Keeps the dispatch filter and the registered subject in lockstep.
pub fn open_with_capabilities(
    config: ChannelConfig,
    refresh: Arc<dyn crate::dispatcher::Refresh>,
    notifier: Arc<dyn crate::dispatcher::Notifier>,
) -> Connection {
    let dispatcher = UpdateDispatcher::new(config.subject.clone(), refresh, notifier);
    open(config, dispatcher)
}

/// Drive one connection from handshake to teardown.
///
/// Frames are dispatched strictly in arrival order: the next frame is not
/// read until the dispatcher has returned for the current one.
async fn run_connection(
    id: ConnectionId,
    url: String,
    register: RegisterFrame,
    dispatcher: UpdateDispatcher,
    state: Arc<StateCell>,
    cancel: CancellationToken,
) {
    let ws = tokio::select! {
        () = cancel.cancelled() => {
            let _ = state.advance(ConnectionState::Closed);
            return;
        }
        connected = connect_async(&url) => match connected {
            Ok((ws, _response)) => ws,
            Err(e) => {
                // The page keeps rendering without live updates.
                error!(conn_id = %id, url, error = %e, "failed to open notification channel");
                let _ = state.advance(ConnectionState::Closed);
                return;
            }
        },
    };

    let _ = state.advance(ConnectionState::Open);
    info!(conn_id = %id, "notification channel open");

    let (mut ws_tx, mut ws_rx) = ws.split();

    // Register once, immediately. No retry: a lost registration means a
    // silent channel, same as any other transport hiccup here.
    let register_json = register.to_json().unwrap_or_else(|e| {
        error!(conn_id = %id, error = %e, "failed to serialize registration");
        String::new()
    });
    if let Err(e) = ws_tx.send(Message::Text(register_json.into())).await {
        warn!(conn_id = %id, error = %e, "failed to send registration");
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatcher.dispatch(text.as_str()),
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws_tx.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) => {
                    info!(conn_id = %id, "peer closed notification channel");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id = %id, error = %e, "notification channel transport error");
                    break;
                }
                None => break,
            }
        }
    }

    let _ = state.advance(ConnectionState::Closed);
    debug!(conn_id = %id, "notification channel closed");
}
