//! Transport boundary: connections, negotiation, outbound calls and the
//! WebSocket server

pub mod connection;
pub mod negotiator;
pub mod outbound;
pub mod registry;
pub mod ws;

pub use connection::Connection;
pub use negotiator::ProtocolNegotiator;
pub use outbound::{CallFailure, OutboundCallTracker};
pub use registry::{ConnectionRegistry, SharedConnectionRegistry};
pub use ws::OcppServer;
