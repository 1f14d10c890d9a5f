//! Connection registry and update fan-out.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wasel_core::{ConnectionId, Envelope, OrderId};

use crate::connection::{Registration, RelayConnection};

/// All currently connected notification clients.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<RelayConnection>>,
    max_send_queue: usize,
}

impl ConnectionRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            connections: DashMap::new(),
            max_send_queue,
        }
    }

    /// Add a new connection, returning it plus the receiver its socket
    /// writer drains.
    pub fn register(&self) -> (Arc<RelayConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let conn = Arc::new(RelayConnection::new(ConnectionId::new(), tx));
        let _ = self.connections.insert(conn.id.clone(), Arc::clone(&conn));
        (conn, rx)
    }

    /// Remove a connection by ID. Removing an unknown ID is a no-op.
    pub fn unregister(&self, id: &ConnectionId) {
        if let Some((_, conn)) = self.connections.remove(id) {
            conn.connected
                .store(false, std::sync::atomic::Ordering::Relaxed);
        }
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// How many connections have completed registration.
    pub fn registered_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_registered())
            .count()
    }

    /// Snapshot of every completed registration.
    pub fn registrations(&self) -> Vec<Registration> {
        self.connections
            .iter()
            .filter_map(|entry| entry.value().registration())
            .collect()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<RelayConnection>> {
        self.connections.get(id).map(|e| Arc::clone(e.value()))
    }

    /// Fan an order-status update out to the connections it applies to:
    /// registered connections watching that order, plus registered
    /// connections watching nothing in particular. Unregistered connections
    /// hear nothing — they have not told us who they are yet.
    ///
    /// Returns the number of recipients.
    pub fn broadcast_order_status(&self, order_id: &OrderId, message: &str) -> usize {
        self.broadcast_to(
            |conn| match conn.registration() {
                Some(reg) => reg.subject.is_none() || reg.subject.as_ref() == Some(order_id),
                None => false,
            },
            &Envelope::order_status(order_id, message),
            order_id.as_str(),
        )
    }

    /// Fan the global UI-setting signal out to every connection.
    pub fn broadcast_ui_setting(&self) -> usize {
        self.broadcast_to(|_| true, &Envelope::ui_setting(), "all")
    }

    /// Serialize once, send to every connection passing `filter`.
    fn broadcast_to(
        &self,
        filter: impl Fn(&RelayConnection) -> bool,
        envelope: &Envelope,
        label: &str,
    ) -> usize {
        let json = match envelope.to_json() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(tag = %envelope.tag, error = %e, "failed to serialize envelope");
                return 0;
            }
        };
        let mut recipients = 0;
        for entry in self.connections.iter() {
            let conn = entry.value();
            if filter(conn) {
                recipients += 1;
                if !conn.send(Arc::clone(&json)) {
                    warn!(
                        conn_id = %conn.id,
                        label,
                        total_drops = conn.drop_count(),
                        "failed to enqueue envelope (queue full or closed)"
                    );
                }
            }
        }
        debug!(tag = %envelope.tag, label, recipients, "broadcast envelope");
        recipients
    }

    /// Remove connections that have not ponged within `timeout`.
    pub fn cleanup_dead(&self, timeout: Duration) -> usize {
        let dead: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| !entry.value().is_alive(timeout))
            .map(|entry| entry.value().id.clone())
            .collect();

        let removed = dead.len();
        for id in dead {
            self.unregister(&id);
            info!(conn_id = %id, "removed unresponsive connection");
        }
        removed
    }
}

/// Periodically sweep dead connections out of the registry.
pub fn start_sweeper(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            let _ = ticker.tick().await;
            let removed = registry.cleanup_dead(timeout);
            if removed > 0 {
                info!(removed, "dead connection sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasel_core::Role;

    fn registered(
        registry: &ConnectionRegistry,
        subject: Option<&str>,
    ) -> (Arc<RelayConnection>, mpsc::Receiver<Arc<String>>) {
        let (conn, rx) = registry.register();
        conn.register(Registration {
            role: Role::Customer,
            user_id: "guest".into(),
            subject: subject.map(OrderId::new),
        });
        (conn, rx)
    }

    #[test]
    fn register_and_unregister() {
        let registry = ConnectionRegistry::new(32);
        assert_eq!(registry.count(), 0);
        let (conn, _rx) = registry.register();
        assert_eq!(registry.count(), 1);
        registry.unregister(&conn.id);
        assert_eq!(registry.count(), 0);
        assert!(!conn.is_connected());
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let registry = ConnectionRegistry::new(32);
        registry.unregister(&ConnectionId::new());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn order_update_reaches_watcher_and_global_listener() {
        let registry = ConnectionRegistry::new(32);
        let (_watcher, mut watcher_rx) = registered(&registry, Some("12345"));
        let (_global, mut global_rx) = registered(&registry, None);
        let (_other, mut other_rx) = registered(&registry, Some("99999"));

        let n = registry.broadcast_order_status(&OrderId::new("12345"), "في الطريق");
        assert_eq!(n, 2);

        let frame = watcher_rx.try_recv().unwrap();
        assert!(frame.contains("order_status_updated"));
        assert!(frame.contains("في الطريق"));
        assert!(global_rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn order_update_skips_unregistered() {
        let registry = ConnectionRegistry::new(32);
        let (_conn, mut rx) = registry.register(); // never registers
        let n = registry.broadcast_order_status(&OrderId::new("1"), "جاري التحضير");
        assert_eq!(n, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn ui_setting_reaches_everyone() {
        let registry = ConnectionRegistry::new(32);
        let (_a, mut a_rx) = registered(&registry, Some("1"));
        let (_b, mut b_rx) = registry.register(); // even unregistered

        let n = registry.broadcast_ui_setting();
        assert_eq!(n, 2);
        assert!(a_rx.try_recv().unwrap().contains("ui_setting_updated"));
        assert!(b_rx.try_recv().is_ok());
    }

    #[test]
    fn broadcast_to_empty_registry() {
        let registry = ConnectionRegistry::new(32);
        assert_eq!(registry.broadcast_order_status(&OrderId::new("1"), "x"), 0);
        assert_eq!(registry.broadcast_ui_setting(), 0);
    }

    #[test]
    fn full_queue_does_not_disconnect() {
        let registry = ConnectionRegistry::new(1);
        let (conn, _rx) = registered(&registry, None);

        let _ = registry.broadcast_ui_setting(); // fills the queue
        let _ = registry.broadcast_ui_setting(); // dropped

        assert_eq!(conn.drop_count(), 1);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn cleanup_removes_stale_connections() {
        let registry = ConnectionRegistry::new(32);
        let (stale, _rx1) = registry.register();
        let (_fresh, _rx2) = registry.register();
        stale.force_stale();

        let removed = registry.cleanup_dead(Duration::from_secs(90));
        assert_eq!(removed, 1);
        assert_eq!(registry.count(), 1);
        assert!(registry.get(&stale.id).is_none());
    }
}
