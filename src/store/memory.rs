//! In-memory store implementation
//!
//! Used for development and tests. Identity lookups go through a sorted
//! index so boundary identities can drive range scans.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::Store;
use crate::domain::{
    ChargePoint, ChargePointConnector, ChargePointIdentity, ChargeSession, ConnectorKey,
    DomainError, DomainResult, SampledValue,
};

/// In-memory store for development and testing.
pub struct InMemoryStore {
    charge_points: DashMap<i64, ChargePoint>,
    /// Sorted identity → id index; supports boundary range queries.
    identity_index: RwLock<BTreeMap<ChargePointIdentity, i64>>,
    connectors: DashMap<ConnectorKey, ChargePointConnector>,
    sessions: DashMap<Uuid, ChargeSession>,
    readings: DashMap<Uuid, Vec<SampledValue>>,
    unlinked_readings: RwLock<Vec<SampledValue>>,
    charge_point_counter: AtomicI64,
    transaction_counters: DashMap<i64, AtomicI64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            charge_points: DashMap::new(),
            identity_index: RwLock::new(BTreeMap::new()),
            connectors: DashMap::new(),
            sessions: DashMap::new(),
            readings: DashMap::new(),
            unlinked_readings: RwLock::new(Vec::new()),
            charge_point_counter: AtomicI64::new(1),
            transaction_counters: DashMap::new(),
        }
    }

    /// Readings recorded without a session id.
    pub fn unlinked_readings(&self) -> Vec<SampledValue> {
        self.unlinked_readings
            .read()
            .expect("index lock poisoned")
            .clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_charge_point(&self, charge_point: ChargePoint) -> DomainResult<()> {
        self.identity_index
            .write()
            .expect("index lock poisoned")
            .insert(charge_point.identity.clone(), charge_point.id);
        self.charge_points.insert(charge_point.id, charge_point);
        Ok(())
    }

    async fn charge_point(&self, id: i64) -> DomainResult<Option<ChargePoint>> {
        Ok(self.charge_points.get(&id).map(|cp| cp.clone()))
    }

    async fn charge_point_by_identity(
        &self,
        identity: &ChargePointIdentity,
    ) -> DomainResult<Option<ChargePoint>> {
        let id = self
            .identity_index
            .read()
            .expect("index lock poisoned")
            .get(identity)
            .copied();
        Ok(id.and_then(|id| self.charge_points.get(&id).map(|cp| cp.clone())))
    }

    async fn update_charge_point(&self, charge_point: ChargePoint) -> DomainResult<()> {
        if !self.charge_points.contains_key(&charge_point.id) {
            return Err(DomainError::ChargePointNotFound(
                charge_point.identity.to_string(),
            ));
        }
        self.charge_points.insert(charge_point.id, charge_point);
        Ok(())
    }

    async fn charge_points_for_identifier(
        &self,
        boundary: &ChargePointIdentity,
    ) -> DomainResult<Vec<ChargePoint>> {
        let ids: Vec<i64> = self
            .identity_index
            .read()
            .expect("index lock poisoned")
            .range(boundary.clone()..)
            .take_while(|(identity, _)| identity.same_charge_point(boundary))
            .map(|(_, id)| *id)
            .collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.charge_points.get(&id).map(|cp| cp.clone()))
            .collect())
    }

    async fn upsert_connector(&self, connector: ChargePointConnector) -> DomainResult<()> {
        self.connectors.insert(connector.key(), connector);
        Ok(())
    }

    async fn connector(&self, key: &ConnectorKey) -> DomainResult<Option<ChargePointConnector>> {
        Ok(self.connectors.get(key).map(|c| c.clone()))
    }

    async fn connectors_for_charge_point(
        &self,
        charge_point_id: i64,
    ) -> DomainResult<Vec<ChargePointConnector>> {
        Ok(self
            .connectors
            .iter()
            .filter(|entry| entry.key().charge_point_id == charge_point_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn save_session(&self, session: ChargeSession) -> DomainResult<()> {
        self.sessions.insert(session.id, session);
        Ok(())
    }

    async fn update_session(&self, session: ChargeSession) -> DomainResult<()> {
        if !self.sessions.contains_key(&session.id) {
            return Err(DomainError::SessionNotFound {
                charge_point_id: session.charge_point_id,
                transaction_id: session.transaction_id,
            });
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    async fn session(&self, id: Uuid) -> DomainResult<Option<ChargeSession>> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn incomplete_session_for_connector(
        &self,
        key: &ConnectorKey,
    ) -> DomainResult<Option<ChargeSession>> {
        Ok(self
            .sessions
            .iter()
            .find(|entry| entry.connector_key() == *key && entry.is_incomplete())
            .map(|entry| entry.value().clone()))
    }

    async fn incomplete_session_by_transaction(
        &self,
        charge_point_id: i64,
        transaction_id: &str,
    ) -> DomainResult<Option<ChargeSession>> {
        Ok(self
            .sessions
            .iter()
            .find(|entry| {
                entry.charge_point_id == charge_point_id
                    && entry.transaction_id == transaction_id
                    && entry.is_incomplete()
            })
            .map(|entry| entry.value().clone()))
    }

    async fn sessions_posted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DomainResult<Vec<ChargeSession>> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| matches!(entry.posted, Some(posted) if posted < cutoff))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_session(&self, id: Uuid) -> DomainResult<()> {
        self.sessions.remove(&id);
        self.readings.remove(&id);
        Ok(())
    }

    async fn save_readings(&self, readings: Vec<SampledValue>) -> DomainResult<usize> {
        let count = readings.len();
        for reading in readings {
            match reading.session_id {
                Some(session_id) => {
                    self.readings.entry(session_id).or_default().push(reading);
                }
                None => {
                    self.unlinked_readings
                        .write()
                        .expect("index lock poisoned")
                        .push(reading);
                }
            }
        }
        Ok(count)
    }

    async fn readings_for_session(&self, session_id: Uuid) -> DomainResult<Vec<SampledValue>> {
        Ok(self
            .readings
            .get(&session_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn next_charge_point_id(&self) -> i64 {
        self.charge_point_counter.fetch_add(1, Ordering::SeqCst)
    }

    async fn next_transaction_id(&self, charge_point_id: i64) -> i64 {
        self.transaction_counters
            .entry(charge_point_id)
            .or_insert_with(|| AtomicI64::new(1))
            .fetch_add(1, Ordering::SeqCst)
    }
}
