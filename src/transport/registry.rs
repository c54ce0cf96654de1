//! Connection registry
//!
//! Thread-safe registry of active charge point connections, keyed by
//! identity. Implements the dispatcher's [`FrameSink`] so encoded
//! responses are written back through the owning connection's channel.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::connection::Connection;
use crate::domain::{ChargePointIdentity, DomainError, DomainResult, OcppVersion};
use crate::engine::FrameSink;

/// Registry of active connections.
pub struct ConnectionRegistry {
    connections: DashMap<ChargePointIdentity, Connection>,
}

/// Shared, reference-counted connection registry.
pub type SharedConnectionRegistry = Arc<ConnectionRegistry>;

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn shared() -> SharedConnectionRegistry {
        Arc::new(Self::new())
    }

    /// Register a new connection; an existing one for the same identity
    /// is replaced (reconnect).
    pub fn register(
        &self,
        identity: ChargePointIdentity,
        sender: mpsc::UnboundedSender<String>,
        version: OcppVersion,
    ) {
        info!(identity = %identity, %version, "Registering connection");
        let connection = Connection::new(identity.clone(), sender, version);
        if self.connections.insert(identity.clone(), connection).is_some() {
            warn!(identity = %identity, "Replaced an existing connection");
        }
    }

    pub fn unregister(&self, identity: &ChargePointIdentity) {
        if self.connections.remove(identity).is_some() {
            info!(identity = %identity, "Unregistered connection");
        }
    }

    /// Queue a frame on the identified connection.
    pub fn send_to(&self, identity: &ChargePointIdentity, frame: String) -> DomainResult<()> {
        match self.connections.get(identity) {
            Some(connection) => connection.send(frame),
            None => Err(DomainError::NotConnected(identity.to_string())),
        }
    }

    pub fn touch(&self, identity: &ChargePointIdentity) {
        if let Some(mut connection) = self.connections.get_mut(identity) {
            connection.touch();
        }
    }

    pub fn is_connected(&self, identity: &ChargePointIdentity) -> bool {
        self.connections.contains_key(identity)
    }

    /// Negotiated protocol version of a live connection.
    pub fn version_of(&self, identity: &ChargePointIdentity) -> Option<OcppVersion> {
        self.connections.get(identity).map(|c| c.version)
    }

    pub fn connected_identities(&self) -> Vec<ChargePointIdentity> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for ConnectionRegistry {
    fn send_frame(&self, origin: &ChargePointIdentity, frame: String) -> DomainResult<()> {
        self.send_to(origin, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ChargePointIdentity {
        ChargePointIdentity::new("CP001", None)
    }

    #[test]
    fn register_send_unregister() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(identity(), tx, OcppVersion::V16);

        assert!(registry.is_connected(&identity()));
        assert_eq!(registry.version_of(&identity()), Some(OcppVersion::V16));
        assert_eq!(registry.count(), 1);

        registry.send_to(&identity(), "frame".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "frame");

        registry.unregister(&identity());
        assert!(!registry.is_connected(&identity()));
        assert!(registry.send_to(&identity(), "frame".into()).is_err());
    }

    #[test]
    fn reconnect_replaces_sender() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(identity(), tx1, OcppVersion::V16);
        registry.register(identity(), tx2, OcppVersion::V201);

        registry.send_to(&identity(), "frame".into()).unwrap();
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), "frame");
        assert_eq!(registry.version_of(&identity()), Some(OcppVersion::V201));
    }

    #[test]
    fn scoped_identities_are_distinct_connections() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        registry.register(
            ChargePointIdentity::new("CP001", Some(1)),
            tx1,
            OcppVersion::V16,
        );
        registry.register(
            ChargePointIdentity::new("CP001", Some(2)),
            tx2,
            OcppVersion::V16,
        );
        assert_eq!(registry.count(), 2);
    }
}
