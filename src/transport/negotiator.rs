//! OCPP protocol version negotiation
//!
//! During the WebSocket handshake the charge point advertises the
//! subprotocols it speaks via `Sec-WebSocket-Protocol`; the negotiator
//! picks the best mutually-supported version.

use crate::domain::OcppVersion;

/// Negotiates the protocol version during the handshake.
pub struct ProtocolNegotiator {
    /// Versions the central system supports, in preference order
    /// (highest first).
    supported: Vec<OcppVersion>,
}

impl ProtocolNegotiator {
    pub fn new(supported: Vec<OcppVersion>) -> Self {
        Self { supported }
    }

    /// All supported versions, newest first.
    pub fn all() -> Self {
        Self::new(OcppVersion::ALL.to_vec())
    }

    /// Pick the best mutual version from the raw header value, or `None`
    /// when there is no overlap.
    pub fn negotiate(&self, requested_protocols: &str) -> Option<OcppVersion> {
        let requested: Vec<&str> = requested_protocols.split(',').map(str::trim).collect();
        self.supported
            .iter()
            .copied()
            .find(|version| requested.contains(&version.subprotocol()))
    }

    pub fn supported_versions(&self) -> &[OcppVersion] {
        &self.supported
    }
}
