//! Action processor contract

use async_trait::async_trait;
use thiserror::Error;

use super::sessions::{AuthorizationError, SessionError};
use crate::domain::{ActionKey, DomainError};
use crate::protocol::{Envelope, ResultSink};

/// Failure a processor can surface to the dispatcher.
///
/// `Unauthorized` becomes a `SecurityError` call error with a fixed
/// description; everything else becomes an `InternalError` carrying the
/// message.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),

    #[error("{0}")]
    Internal(String),
}

impl From<DomainError> for ProcessError {
    fn from(err: DomainError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<SessionError> for ProcessError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthorized(auth) => Self::Unauthorized(auth),
            SessionError::Domain(domain) => Self::Internal(domain.to_string()),
        }
    }
}

/// One registered action handler.
///
/// A processor declares the actions it wants; the dispatcher invokes
/// every registered processor for an action in order, and the first
/// outcome delivered through the sink wins. Deliver before returning —
/// a processor that returns without delivering acts as an observer.
#[async_trait]
pub trait ActionProcessor: Send + Sync {
    /// Actions this processor handles.
    fn actions(&self) -> Vec<ActionKey>;

    /// Registration-order ties are broken by priority; lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Handle one decoded call.
    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError>;
}
