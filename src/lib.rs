//! # OCPP Protocol Engine
//!
//! The charge-point protocol engine of a central system: accepts inbound
//! OCPP action messages, validates and decodes them per protocol
//! version, routes them through a processor registry, maintains the
//! authoritative in-memory state of charging sessions and connector
//! status, and returns correlated responses or structured call errors.
//!
//! ## Architecture
//!
//! - **domain**: value types, action tables and reference data
//! - **protocol**: framing, envelopes, error taxonomy, per-version
//!   decoders
//! - **engine**: processor registry, dispatcher, session manager,
//!   connector tracker
//! - **store** / **authorization**: external collaborators, specified as
//!   traits with in-memory implementations
//! - **transport**: connection registry, outbound call tracking and the
//!   WebSocket server boundary

pub mod authorization;
pub mod config;
pub mod domain;
pub mod engine;
pub mod protocol;
pub mod store;
pub mod support;
pub mod transport;

pub use authorization::{AuthorizationService, AuthorizationStatus, StaticAuthorizationService};
pub use config::{default_config_path, AppConfig};
pub use engine::{
    standard_registry, ChargeSessionManager, ConnectorStatusTracker, Dispatcher, ProcessorRegistry,
};
pub use store::{InMemoryStore, Store};
pub use transport::{ConnectionRegistry, OcppServer, OutboundCallTracker, ProtocolNegotiator};
