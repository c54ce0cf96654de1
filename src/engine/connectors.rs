//! Connector status tracker
//!
//! Last-write-wins cache of the latest status notification per connector,
//! keyed by `(charge_point_id, connector_id)`. No transition legality is
//! checked. Connector id 0 addresses the charge point as a whole: the
//! update fans out to every known connector and records connector 0's own
//! entry. Writes go through to the store; reads come from the cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::domain::{
    ChargePointConnector, ConnectorErrorCode, ConnectorKey, ConnectorStatus, DomainResult,
    CHARGE_POINT_CONNECTOR_ID,
};
use crate::store::Store;

/// One decoded status report.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: ConnectorStatus,
    pub error_code: ConnectorErrorCode,
    pub timestamp: Option<DateTime<Utc>>,
    pub info: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_error_code: Option<String>,
}

impl StatusReport {
    pub fn of(status: ConnectorStatus) -> Self {
        Self {
            status,
            error_code: ConnectorErrorCode::NoError,
            timestamp: None,
            info: None,
            vendor_id: None,
            vendor_error_code: None,
        }
    }

    fn into_record(self, key: ConnectorKey) -> ChargePointConnector {
        ChargePointConnector {
            charge_point_id: key.charge_point_id,
            connector_id: key.connector_id,
            status: self.status,
            error_code: self.error_code,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            info: self.info,
            vendor_id: self.vendor_id,
            vendor_error_code: self.vendor_error_code,
        }
    }
}

/// Per-connector status cache.
pub struct ConnectorStatusTracker {
    store: Arc<dyn Store>,
    cache: DashMap<ConnectorKey, ChargePointConnector>,
}

impl ConnectorStatusTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Record a status report for `(charge_point_id, connector_id)`.
    ///
    /// Connector id 0 fans out to every known connector of the charge
    /// point in addition to its own record.
    pub async fn record_status(
        &self,
        charge_point_id: i64,
        connector_id: u32,
        report: StatusReport,
    ) -> DomainResult<()> {
        let key = ConnectorKey::new(charge_point_id, connector_id);

        if connector_id == CHARGE_POINT_CONNECTOR_ID {
            let known: Vec<ConnectorKey> = self
                .cache
                .iter()
                .map(|entry| *entry.key())
                .filter(|k| k.charge_point_id == charge_point_id && !k.is_charge_point())
                .collect();
            debug!(
                charge_point_id,
                fan_out = known.len(),
                "Status update for connector 0"
            );
            for target in known {
                self.write(target, report.clone()).await?;
            }
        }

        self.write(key, report).await
    }

    async fn write(&self, key: ConnectorKey, report: StatusReport) -> DomainResult<()> {
        let record = report.into_record(key);
        // Update the cache first, then persist; no cache guard is held
        // across the store call.
        self.cache.insert(key, record.clone());
        self.store.upsert_connector(record).await
    }

    /// Most recent record for one connector; absent if none reported yet.
    pub fn status(&self, key: &ConnectorKey) -> Option<ChargePointConnector> {
        self.cache.get(key).map(|record| record.clone())
    }

    /// All known connector records for one charge point.
    pub fn statuses_for_charge_point(&self, charge_point_id: i64) -> Vec<ChargePointConnector> {
        self.cache
            .iter()
            .filter(|entry| entry.key().charge_point_id == charge_point_id)
            .map(|entry| entry.value().clone())
            .collect()
    }
}
