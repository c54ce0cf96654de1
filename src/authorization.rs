//! Authorization collaborator
//!
//! The engine does not own authorization data; it asks this service for a
//! verdict on an auth id. The verdict may carry a reusable transaction id
//! for concurrent-transaction conflicts, which callers echo back to the
//! charge point instead of rejecting outright.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::domain::{ChargePointIdentity, DomainResult};

/// Authorization verdict for an auth id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
    ConcurrentTx,
}

impl AuthorizationStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Full verdict returned by the authorization service.
#[derive(Debug, Clone)]
pub struct AuthorizationVerdict {
    pub status: AuthorizationStatus,
    /// Transaction id to echo when the verdict refers to an existing
    /// transaction (e.g. `ConcurrentTx`).
    pub reusable_transaction_id: Option<i64>,
}

impl AuthorizationVerdict {
    pub fn accepted() -> Self {
        Self {
            status: AuthorizationStatus::Accepted,
            reusable_transaction_id: None,
        }
    }

    pub fn denied(status: AuthorizationStatus) -> Self {
        Self {
            status,
            reusable_transaction_id: None,
        }
    }
}

/// External authorization service.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Decide whether `auth_id` may charge at the given charge point.
    async fn authorize(
        &self,
        auth_id: &str,
        identity: &ChargePointIdentity,
    ) -> DomainResult<AuthorizationVerdict>;
}

/// In-memory authorization service for development and tests.
///
/// Unknown auth ids are `Invalid`.
pub struct StaticAuthorizationService {
    tags: DashMap<String, AuthorizationStatus>,
}

impl StaticAuthorizationService {
    pub fn new() -> Self {
        Self {
            tags: DashMap::new(),
        }
    }

    /// Accept the given auth ids.
    pub fn with_accepted<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let service = Self::new();
        for tag in tags {
            service.set_status(tag, AuthorizationStatus::Accepted);
        }
        service
    }

    pub fn set_status(&self, auth_id: impl Into<String>, status: AuthorizationStatus) {
        self.tags.insert(auth_id.into(), status);
    }
}

impl Default for StaticAuthorizationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorizationService for StaticAuthorizationService {
    async fn authorize(
        &self,
        auth_id: &str,
        _identity: &ChargePointIdentity,
    ) -> DomainResult<AuthorizationVerdict> {
        let status = self
            .tags
            .get(auth_id)
            .map(|entry| *entry.value())
            .unwrap_or(AuthorizationStatus::Invalid);
        Ok(AuthorizationVerdict {
            status,
            reusable_transaction_id: None,
        })
    }
}
