//! Domain errors

use thiserror::Error;

/// Domain-level error types
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Charge point not found: {0}")]
    ChargePointNotFound(String),

    #[error("No active session for transaction {transaction_id} on charge point {charge_point_id}")]
    SessionNotFound {
        charge_point_id: i64,
        transaction_id: String,
    },

    #[error("Session already ended: {0}")]
    SessionAlreadyEnded(uuid::Uuid),

    #[error("Active session already exists for connector {connector_id} on charge point {charge_point_id}")]
    SessionConflict {
        charge_point_id: i64,
        connector_id: u32,
    },

    #[error("Connector not found: {0}")]
    ConnectorNotFound(u32),

    #[error("Charge point {0} is not connected")]
    NotConnected(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("{0}")]
    Other(String),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
