//! Update intake: the path by which status changes reach the registry.
//!
//! Producers (the HTTP publish endpoints, or anything in-process holding an
//! [`UpdatePublisher`]) push [`StatusUpdate`]s onto a broadcast channel; a
//! bridge task drains it and fans each update out through the
//! [`ConnectionRegistry`]. Decoupling intake from fan-out keeps publishers
//! from ever touching socket state.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wasel_core::OrderId;

use crate::registry::ConnectionRegistry;

/// A status change entering the relay.
#[derive(Clone, Debug, PartialEq)]
pub enum StatusUpdate {
    /// An order moved to a new status.
    OrderStatus { order_id: OrderId, message: String },
    /// The global UI configuration changed.
    UiSetting,
}

/// Handle for publishing updates into the relay.
#[derive(Clone)]
pub struct UpdatePublisher {
    tx: broadcast::Sender<StatusUpdate>,
}

impl UpdatePublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an order-status change. Returns the number of bridge
    /// subscribers that received it (zero if no bridge is running).
    pub fn publish_order_status(&self, order_id: OrderId, message: impl Into<String>) -> usize {
        self.publish(StatusUpdate::OrderStatus {
            order_id,
            message: message.into(),
        })
    }

    /// Publish the UI-setting change signal.
    pub fn publish_ui_setting(&self) -> usize {
        self.publish(StatusUpdate::UiSetting)
    }

    fn publish(&self, update: StatusUpdate) -> usize {
        match self.tx.send(update) {
            Ok(n) => n,
            Err(_) => {
                debug!("update published with no bridge listening");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }
}

/// Spawn the bridge task that moves updates from `rx` into the registry.
pub fn create_bridge(
    registry: Arc<ConnectionRegistry>,
    mut rx: broadcast::Receiver<StatusUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(StatusUpdate::OrderStatus { order_id, message }) => {
                    let recipients = registry.broadcast_order_status(&order_id, &message);
                    info!(order_id = %order_id, recipients, "relayed order status update");
                }
                Ok(StatusUpdate::UiSetting) => {
                    let recipients = registry.broadcast_ui_setting();
                    info!(recipients, "relayed ui setting update");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "update bridge lagged, updates skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("update bridge stopped");
    })
}
