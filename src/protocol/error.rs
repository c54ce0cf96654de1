//! Protocol error taxonomy
//!
//! Every failure a handler can signal maps to one of these kinds; each
//! kind has a fixed wire code used in call-error frames. Schema failures
//! additionally carry the offending payload so the charge point can see
//! exactly what was rejected.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// The kinds of error a handler can signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Payload is syntactically malformed for the action.
    FormationViolation,
    /// Payload fails the action's schema.
    SchemaValidation,
    /// No processor is registered for the action.
    NotImplemented,
    /// The action exists but is not supported in this context.
    NotSupported,
    /// A processor failed unexpectedly.
    InternalError,
    /// Authorization failure.
    SecurityError,
    /// Frame-level protocol violation.
    ProtocolError,
    /// Catch-all.
    GenericError,
    /// A field occurs the wrong number of times.
    OccurenceConstraintViolation,
    /// A field value violates a property constraint.
    PropertyConstraintViolation,
    /// A field has the wrong type.
    TypeConstraintViolation,
}

impl ErrorKind {
    /// Wire error code used in call-error frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FormationViolation => "FormationViolation",
            Self::SchemaValidation => "SchemaValidation",
            Self::NotImplemented => "NotImplemented",
            Self::NotSupported => "NotSupported",
            Self::InternalError => "InternalError",
            Self::SecurityError => "SecurityError",
            Self::ProtocolError => "ProtocolError",
            Self::GenericError => "GenericError",
            Self::OccurenceConstraintViolation => "OccurenceConstraintViolation",
            Self::PropertyConstraintViolation => "PropertyConstraintViolation",
            Self::TypeConstraintViolation => "TypeConstraintViolation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A protocol-level error with a human-readable description and, for
/// schema errors, the offending payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {description}")]
pub struct OcppError {
    pub kind: ErrorKind,
    pub description: String,
    /// Attached error details; for schema errors, the original payload.
    pub details: Option<Value>,
}

impl OcppError {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn formation_violation(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::FormationViolation, description)
    }

    /// Schema failure carrying the original payload unchanged.
    pub fn schema_validation(description: impl Into<String>, payload: Value) -> Self {
        Self::new(ErrorKind::SchemaValidation, description).with_details(payload)
    }

    pub fn not_implemented(action: &str) -> Self {
        Self::new(
            ErrorKind::NotImplemented,
            format!("No handler registered for action {}", action),
        )
    }

    pub fn not_supported(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, description)
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, description)
    }

    /// Fixed, non-leaking description for authorization failures.
    pub fn security() -> Self {
        Self::new(ErrorKind::SecurityError, "Authorization error handling action.")
    }

    pub fn protocol(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, description)
    }

    pub fn property_constraint(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::PropertyConstraintViolation, description)
    }
}
