//! Store trait definitions
//!
//! Persistence is an external collaborator. The engine talks to it
//! through this trait only; callers never hold an in-process lock while
//! one of these calls is outstanding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ChargePoint, ChargePointConnector, ChargePointIdentity, ChargeSession, ConnectorKey,
    DomainResult, SampledValue,
};

/// Store for charge points, connectors, sessions and readings.
#[async_trait]
pub trait Store: Send + Sync {
    // Charge point operations
    async fn save_charge_point(&self, charge_point: ChargePoint) -> DomainResult<()>;
    async fn charge_point(&self, id: i64) -> DomainResult<Option<ChargePoint>>;
    async fn charge_point_by_identity(
        &self,
        identity: &ChargePointIdentity,
    ) -> DomainResult<Option<ChargePoint>>;
    async fn update_charge_point(&self, charge_point: ChargePoint) -> DomainResult<()>;
    /// All charge points whose identity shares the boundary's identifier,
    /// across every user scope.
    async fn charge_points_for_identifier(
        &self,
        boundary: &ChargePointIdentity,
    ) -> DomainResult<Vec<ChargePoint>>;

    // Connector operations
    async fn upsert_connector(&self, connector: ChargePointConnector) -> DomainResult<()>;
    async fn connector(&self, key: &ConnectorKey) -> DomainResult<Option<ChargePointConnector>>;
    async fn connectors_for_charge_point(
        &self,
        charge_point_id: i64,
    ) -> DomainResult<Vec<ChargePointConnector>>;

    // Session operations
    async fn save_session(&self, session: ChargeSession) -> DomainResult<()>;
    async fn update_session(&self, session: ChargeSession) -> DomainResult<()>;
    async fn session(&self, id: Uuid) -> DomainResult<Option<ChargeSession>>;
    async fn incomplete_session_for_connector(
        &self,
        key: &ConnectorKey,
    ) -> DomainResult<Option<ChargeSession>>;
    async fn incomplete_session_by_transaction(
        &self,
        charge_point_id: i64,
        transaction_id: &str,
    ) -> DomainResult<Option<ChargeSession>>;
    async fn sessions_posted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DomainResult<Vec<ChargeSession>>;
    async fn delete_session(&self, id: Uuid) -> DomainResult<()>;

    // Reading operations
    async fn save_readings(&self, readings: Vec<SampledValue>) -> DomainResult<usize>;
    async fn readings_for_session(&self, session_id: Uuid) -> DomainResult<Vec<SampledValue>>;

    // Id allocation
    async fn next_charge_point_id(&self) -> i64;
    /// Transaction ids are unique per charge point.
    async fn next_transaction_id(&self, charge_point_id: i64) -> i64;
}
