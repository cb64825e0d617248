use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::listener::LogicalListener;

/// Identifier of a registered logical listener.
///
/// This is the raw descriptor of the listener's first member socket, which
/// stays open (and therefore unique) for as long as the listener is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(RawFd);

impl ListenerId {
    pub(crate) fn from_raw(fd: RawFd) -> Self {
        Self(fd)
    }

    /// The underlying descriptor number.
    pub fn as_raw(self) -> RawFd {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Process-wide table of live logical listeners.
///
/// Lookups hand out `Arc`s so an acceptor can keep waiting while another
/// thread closes the listener; the close is observed as
/// [`TransportError::ListenerClosed`].
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<ListenerId, Arc<LogicalListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its identifier.
    pub fn insert(&self, listener: LogicalListener) -> ListenerId {
        let id = listener.id();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        debug!(%id, "listener registered");
        id
    }

    pub fn get(&self, id: ListenerId) -> Result<Arc<LogicalListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(TransportError::UnknownListener(id))
    }

    /// Unregister without closing.
    pub fn remove(&self, id: ListenerId) -> Result<Arc<LogicalListener>> {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(TransportError::UnknownListener(id))
    }

    /// Unregister and close every member socket.
    pub fn close(&self, id: ListenerId) -> Result<()> {
        let listener = self.remove(id)?;
        listener.close()
    }

    /// Close every registered listener, returning the first failure.
    pub fn close_all(&self) -> Result<()> {
        let drained: Vec<_> = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, listener)| listener)
            .collect();

        let mut first_err = None;
        for listener in drained {
            if let Err(err) = listener.close() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Identifiers of all registered listeners, sorted.
    pub fn ids(&self) -> Vec<ListenerId> {
        let mut ids: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::config::TransportConfig;

    fn bind_loopback() -> LogicalListener {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        LogicalListener::bind_addrs(&[addr], &TransportConfig::default()).unwrap()
    }

    #[test]
    fn insert_get_close() {
        let registry = ListenerRegistry::new();
        let id = registry.insert(bind_loopback());
        assert_eq!(registry.ids(), vec![id]);

        let listener = registry.get(id).unwrap();
        assert_eq!(listener.id(), id);

        registry.close(id).unwrap();
        assert!(listener.is_closed());
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(id),
            Err(TransportError::UnknownListener(unknown)) if unknown == id
        ));
        assert!(matches!(
            registry.close(id),
            Err(TransportError::UnknownListener(_))
        ));
    }

    #[test]
    fn close_all_drains_registry() {
        let registry = ListenerRegistry::new();
        let a = registry.insert(bind_loopback());
        let b = registry.insert(bind_loopback());
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        let held = registry.get(a).unwrap();
        registry.close_all().unwrap();
        assert!(registry.is_empty());
        assert!(held.is_closed());
    }

    #[test]
    fn display_names_the_descriptor() {
        let id = ListenerId::from_raw(7);
        assert_eq!(id.to_string(), "listener#7");
        assert_eq!(id.as_raw(), 7);
    }
}
