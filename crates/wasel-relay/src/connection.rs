//! Per-socket connection state on the relay side.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use wasel_core::{OrderId, RegisterFrame, Role};

/// What a connection announced about itself in its `register` frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    /// Role of the viewer context.
    pub role: Role,
    /// Identifier of the viewing user.
    pub user_id: String,
    /// The order this connection watches; `None` means it listens to all.
    pub subject: Option<OrderId>,
}

impl From<RegisterFrame> for Registration {
    fn from(frame: RegisterFrame) -> Self {
        Self {
            role: frame.user_type,
            user_id: frame.user_id,
            subject: frame.order_id,
        }
    }
}

/// A connected notification client.
///
/// Starts unregistered; the registration slot is filled when the client's
/// `register` frame arrives, and may be replaced if the client re-registers.
pub struct RelayConnection {
    /// Unique connection ID.
    pub id: wasel_core::ConnectionId,
    registration: Mutex<Option<Registration>>,
    /// Send side of the socket's bounded write queue.
    tx: mpsc::Sender<Arc<String>>,
    /// Cleared when either socket task exits.
    pub connected: AtomicBool,
    /// Unix seconds of the last pong (or connect).
    last_pong: AtomicU64,
    /// Frames dropped because the write queue was full.
    dropped: AtomicU64,
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl RelayConnection {
    pub fn new(id: wasel_core::ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            registration: Mutex::new(None),
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Record (or replace) this connection's registration.
    pub fn register(&self, registration: Registration) {
        *self.registration.lock() = Some(registration);
    }

    pub fn registration(&self) -> Option<Registration> {
        self.registration.lock().clone()
    }

    /// The order this connection watches, if registered with one.
    pub fn subject(&self) -> Option<OrderId> {
        self.registration.lock().as_ref().and_then(|r| r.subject.clone())
    }

    pub fn is_registered(&self) -> bool {
        self.registration.lock().is_some()
    }

    /// Enqueue a frame for the socket writer.
    ///
    /// Returns `false` if the queue is full or closed; a full queue drops
    /// this frame and increments the drop counter — slow consumers never
    /// block the fan-out.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    /// Whether a pong has been seen within `timeout`.
    pub fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs()
    }

    #[cfg(test)]
    pub(crate) fn force_stale(&self) {
        self.last_pong.store(0, Ordering::Relaxed);
    }
}
