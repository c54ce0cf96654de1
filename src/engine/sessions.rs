//! Charge session manager
//!
//! The state machine for charging transactions. The single invariant that
//! matters here: for a given `(charge_point_id, connector_id)` at most one
//! incomplete session exists at a time. Check-and-create runs under one
//! per-connector async mutex so two concurrent starts for the same
//! connector cannot both succeed, while unrelated connectors stay
//! independent. Dashmap guards are never held across an await.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::authorization::{AuthorizationService, AuthorizationStatus};
use crate::domain::{
    ChargePointIdentity, ChargeSession, ConnectorKey, DomainError, DomainResult, SampledValue,
    SessionEndReason,
};
use crate::store::Store;
use crate::support::shutdown::ShutdownSignal;

/// Authorization gate failure.
///
/// May carry the transaction id of an existing session so callers can
/// echo it instead of rejecting outright (concurrent-transaction
/// continuation).
#[derive(Debug, Clone, Error)]
#[error("Authorization failed with status {status:?}")]
pub struct AuthorizationError {
    pub status: AuthorizationStatus,
    pub existing_transaction_id: Option<i64>,
}

impl AuthorizationError {
    pub fn new(status: AuthorizationStatus) -> Self {
        Self {
            status,
            existing_transaction_id: None,
        }
    }
}

/// Failure modes of session-manager operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Input for starting a charging session.
#[derive(Debug, Clone)]
pub struct StartSessionInfo {
    pub identity: ChargePointIdentity,
    pub charge_point_id: i64,
    pub connector_id: u32,
    pub auth_id: String,
    pub meter_start: i32,
    /// Start time as reported by the charge point; `now` when absent.
    pub started: Option<DateTime<Utc>>,
    pub reservation_id: Option<i32>,
    /// Transaction id supplied by the charge point (2.0.1 style); a
    /// fresh per-charge-point id is minted when absent.
    pub transaction_id: Option<String>,
}

/// Session manager tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// On a concurrent-transaction conflict, carry the existing
    /// transaction id in the error so the caller can echo it.
    pub reuse_existing_transaction: bool,
    /// How long posted sessions are retained before the purge removes
    /// them.
    pub retention: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reuse_existing_transaction: true,
            retention: Duration::hours(4),
        }
    }
}

/// The per-connector transaction state machine.
pub struct ChargeSessionManager {
    store: Arc<dyn Store>,
    authorization: Arc<dyn AuthorizationService>,
    config: SessionConfig,
    /// One async mutex per connector; serializes check-and-create.
    connector_locks: DashMap<ConnectorKey, Arc<Mutex<()>>>,
}

impl ChargeSessionManager {
    pub fn new(
        store: Arc<dyn Store>,
        authorization: Arc<dyn AuthorizationService>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            authorization,
            config,
            connector_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, key: ConnectorKey) -> Arc<Mutex<()>> {
        self.connector_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// `Idle → Active`: authorize, then atomically check-and-create.
    pub async fn start_charging_session(
        &self,
        info: StartSessionInfo,
    ) -> Result<ChargeSession, SessionError> {
        let verdict = self
            .authorization
            .authorize(&info.auth_id, &info.identity)
            .await?;
        if !verdict.status.is_accepted() {
            return Err(AuthorizationError {
                status: verdict.status,
                existing_transaction_id: verdict.reusable_transaction_id,
            }
            .into());
        }

        let key = ConnectorKey::new(info.charge_point_id, info.connector_id);
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        if let Some(existing) = self.store.incomplete_session_for_connector(&key).await? {
            let existing_transaction_id = self
                .config
                .reuse_existing_transaction
                .then(|| existing.numeric_transaction_id())
                .flatten();
            warn!(
                connector = %key,
                transaction_id = existing.transaction_id.as_str(),
                "Rejecting concurrent transaction"
            );
            return Err(AuthorizationError {
                status: AuthorizationStatus::ConcurrentTx,
                existing_transaction_id,
            }
            .into());
        }

        let transaction_id = match info.transaction_id {
            Some(id) => id,
            None => self
                .store
                .next_transaction_id(info.charge_point_id)
                .await
                .to_string(),
        };
        let session = ChargeSession::new(
            info.auth_id,
            info.charge_point_id,
            info.connector_id,
            transaction_id.clone(),
            info.meter_start,
            info.started,
        );
        self.store.save_session(session.clone()).await?;

        info!(
            connector = %key,
            transaction_id = transaction_id.as_str(),
            session_id = %session.id,
            "Charging session started"
        );
        Ok(session)
    }

    /// `Active → Active`: append readings; lifecycle-neutral.
    pub async fn add_charging_session_readings(
        &self,
        readings: Vec<SampledValue>,
    ) -> DomainResult<usize> {
        self.store.save_readings(readings).await
    }

    /// `Active → Ended`: fails if no incomplete session matches.
    pub async fn end_charging_session(
        &self,
        charge_point_id: i64,
        transaction_id: &str,
        meter_end: i32,
        timestamp: Option<DateTime<Utc>>,
        reason: Option<SessionEndReason>,
    ) -> Result<ChargeSession, SessionError> {
        let session = self
            .store
            .incomplete_session_by_transaction(charge_point_id, transaction_id)
            .await?
            .ok_or_else(|| DomainError::SessionNotFound {
                charge_point_id,
                transaction_id: transaction_id.to_string(),
            })?;

        let lock = self.lock_for(session.connector_key());
        let _guard = lock.lock().await;

        // Re-check under the lock; a concurrent stop may have won.
        let mut session = self
            .store
            .incomplete_session_by_transaction(charge_point_id, transaction_id)
            .await?
            .ok_or_else(|| DomainError::SessionNotFound {
                charge_point_id,
                transaction_id: transaction_id.to_string(),
            })?;

        session.end(meter_end, timestamp, reason);
        self.store.update_session(session.clone()).await?;

        info!(
            connector = %session.connector_key(),
            transaction_id,
            energy = ?session.energy_delivered(),
            "Charging session ended"
        );
        Ok(session)
    }

    /// Read-only lookup among incomplete sessions; absent when nothing
    /// matches.
    pub async fn get_active_charging_session(
        &self,
        charge_point_id: i64,
        transaction_id: &str,
    ) -> DomainResult<Option<ChargeSession>> {
        self.store
            .incomplete_session_by_transaction(charge_point_id, transaction_id)
            .await
    }

    /// Read-only lookup by connector; absent when nothing matches.
    pub async fn get_active_charging_session_for_connector(
        &self,
        key: &ConnectorKey,
    ) -> DomainResult<Option<ChargeSession>> {
        self.store.incomplete_session_for_connector(key).await
    }

    /// Mark a session as uploaded downstream; it becomes eligible for the
    /// purge once the retention window passes.
    pub async fn mark_posted(&self, session_id: Uuid) -> DomainResult<()> {
        let mut session = self
            .store
            .session(session_id)
            .await?
            .ok_or(DomainError::SessionAlreadyEnded(session_id))?;
        session.mark_posted();
        self.store.update_session(session).await
    }

    /// Remove sessions whose `posted` timestamp is older than the
    /// retention window. Returns the number purged.
    pub async fn purge_posted_sessions(&self) -> DomainResult<usize> {
        let cutoff = Utc::now() - self.config.retention;
        let stale = self.store.sessions_posted_before(cutoff).await?;
        let count = stale.len();
        for session in stale {
            self.store.delete_session(session.id).await?;
        }
        if count > 0 {
            info!(count, "Purged posted charging sessions");
        }
        Ok(count)
    }
}

/// Start the periodic session purge task.
pub fn start_session_purge_task(
    manager: Arc<ChargeSessionManager>,
    shutdown: ShutdownSignal,
    sweep_interval_secs: u64,
) {
    tokio::spawn(async move {
        info!(
            sweep_interval = sweep_interval_secs,
            "Session purge task started"
        );

        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(sweep_interval_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = manager.purge_posted_sessions().await {
                        warn!(error = %e, "Session purge error");
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("Session purge task shutting down");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::StaticAuthorizationService;
    use crate::store::InMemoryStore;

    fn manager_with(
        config: SessionConfig,
    ) -> (Arc<ChargeSessionManager>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let auth = Arc::new(StaticAuthorizationService::with_accepted(["TAG-1", "TAG-2"]));
        let manager = Arc::new(ChargeSessionManager::new(
            store.clone(),
            auth,
            config,
        ));
        (manager, store)
    }

    fn start_info(connector_id: u32, auth_id: &str) -> StartSessionInfo {
        StartSessionInfo {
            identity: ChargePointIdentity::new("CP001", None),
            charge_point_id: 1,
            connector_id,
            auth_id: auth_id.into(),
            meter_start: 1000,
            started: None,
            reservation_id: None,
            transaction_id: None,
        }
    }

    #[tokio::test]
    async fn start_creates_incomplete_session() {
        let (manager, _) = manager_with(SessionConfig::default());
        let session = manager
            .start_charging_session(start_info(1, "TAG-1"))
            .await
            .unwrap();
        assert!(session.is_incomplete());
        assert_eq!(session.numeric_transaction_id(), Some(1));

        let found = manager
            .get_active_charging_session(1, &session.transaction_id)
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, session.id);
    }

    #[tokio::test]
    async fn unauthorized_tag_is_rejected() {
        let (manager, _) = manager_with(SessionConfig::default());
        let err = manager
            .start_charging_session(start_info(1, "UNKNOWN"))
            .await
            .unwrap_err();
        match err {
            SessionError::Unauthorized(auth) => {
                assert_eq!(auth.status, AuthorizationStatus::Invalid);
                assert!(auth.existing_transaction_id.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn second_start_conflicts_and_echoes_transaction_id() {
        let (manager, _) = manager_with(SessionConfig::default());
        let first = manager
            .start_charging_session(start_info(1, "TAG-1"))
            .await
            .unwrap();

        let err = manager
            .start_charging_session(start_info(1, "TAG-2"))
            .await
            .unwrap_err();
        match err {
            SessionError::Unauthorized(auth) => {
                assert_eq!(auth.status, AuthorizationStatus::ConcurrentTx);
                assert_eq!(
                    auth.existing_transaction_id,
                    first.numeric_transaction_id()
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn conflict_without_reuse_carries_no_transaction_id() {
        let (manager, _) = manager_with(SessionConfig {
            reuse_existing_transaction: false,
            ..SessionConfig::default()
        });
        manager
            .start_charging_session(start_info(1, "TAG-1"))
            .await
            .unwrap();
        let err = manager
            .start_charging_session(start_info(1, "TAG-2"))
            .await
            .unwrap_err();
        match err {
            SessionError::Unauthorized(auth) => {
                assert!(auth.existing_transaction_id.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn other_connectors_stay_independent() {
        let (manager, _) = manager_with(SessionConfig::default());
        manager
            .start_charging_session(start_info(1, "TAG-1"))
            .await
            .unwrap();
        // Same charge point, different connector: allowed.
        manager
            .start_charging_session(start_info(2, "TAG-2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_starts_yield_exactly_one_success() {
        let (manager, _) = manager_with(SessionConfig::default());
        let (a, b) = tokio::join!(
            manager.start_charging_session(start_info(1, "TAG-1")),
            manager.start_charging_session(start_info(1, "TAG-2")),
        );
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        let conflict = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(conflict, SessionError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn end_completes_and_second_end_fails() {
        let (manager, _) = manager_with(SessionConfig::default());
        let session = manager
            .start_charging_session(start_info(1, "TAG-1"))
            .await
            .unwrap();

        let ended = manager
            .end_charging_session(
                1,
                &session.transaction_id,
                6000,
                None,
                Some(SessionEndReason::Local),
            )
            .await
            .unwrap();
        assert!(!ended.is_incomplete());
        assert_eq!(ended.energy_delivered(), Some(5000));

        let err = manager
            .end_charging_session(1, &session.transaction_id, 6000, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Domain(DomainError::SessionNotFound { .. })));
    }

    #[tokio::test]
    async fn purge_removes_only_posted_sessions_past_retention() {
        let (manager, store) = manager_with(SessionConfig {
            retention: Duration::hours(4),
            ..SessionConfig::default()
        });
        let session = manager
            .start_charging_session(start_info(1, "TAG-1"))
            .await
            .unwrap();
        manager
            .end_charging_session(1, &session.transaction_id, 2000, None, None)
            .await
            .unwrap();
        manager.mark_posted(session.id).await.unwrap();

        // Posted just now: inside the retention window, kept.
        assert_eq!(manager.purge_posted_sessions().await.unwrap(), 0);

        // Age the posted stamp past the window.
        let mut aged = store.session(session.id).await.unwrap().unwrap();
        aged.posted = Some(Utc::now() - Duration::hours(5));
        store.update_session(aged).await.unwrap();

        assert_eq!(manager.purge_posted_sessions().await.unwrap(), 1);
        assert!(store.session(session.id).await.unwrap().is_none());
    }
}
