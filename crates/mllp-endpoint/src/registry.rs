use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Live-connection registry owned by a server listener.
///
/// Each accepted connection registers itself and receives a guard whose
/// `Drop` deregisters it, so the registry stays accurate even when a
/// worker exits by panic or early return.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    connections: Mutex<HashMap<u64, SocketAddr>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; returns the guard that deregisters on drop.
    pub fn register(&self, peer: SocketAddr) -> ConnectionGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut connections) = self.inner.connections.lock() {
            connections.insert(id, peer);
        }
        debug!(id, %peer, "connection registered");
        ConnectionGuard {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of currently registered connections.
    pub fn active(&self) -> usize {
        self.inner
            .connections
            .lock()
            .map(|connections| connections.len())
            .unwrap_or(0)
    }

    /// Snapshot of registered connection ids and peer addresses.
    pub fn snapshot(&self) -> Vec<(u64, SocketAddr)> {
        self.inner
            .connections
            .lock()
            .map(|connections| {
                let mut entries: Vec<_> =
                    connections.iter().map(|(&id, &peer)| (id, peer)).collect();
                entries.sort_by_key(|&(id, _)| id);
                entries
            })
            .unwrap_or_default()
    }
}

/// Deregisters its connection from the owning registry on drop.
pub struct ConnectionGuard {
    id: u64,
    inner: Arc<RegistryInner>,
}

impl ConnectionGuard {
    /// The listener-assigned connection id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Ok(mut connections) = self.inner.connections.lock() {
            connections.remove(&self.id);
        }
        debug!(id = self.id, "connection deregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn register_and_drop_tracks_active_count() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.active(), 0);

        let first = registry.register(peer(1001));
        let second = registry.register(peer(1002));
        assert_eq!(registry.active(), 2);
        assert_ne!(first.id(), second.id());

        drop(first);
        assert_eq!(registry.active(), 1);
        drop(second);
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let registry = ConnectionRegistry::new();
        let _a = registry.register(peer(1001));
        let _b = registry.register(peer(1002));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].0 < snapshot[1].0);
    }

    #[test]
    fn guard_cleanup_survives_panicking_worker() {
        let registry = ConnectionRegistry::new();
        let guard = registry.register(peer(1003));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = guard;
            panic!("worker died");
        }));
        assert!(result.is_err());
        assert_eq!(registry.active(), 0);
    }
}
