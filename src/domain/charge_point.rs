//! Charge point and connector domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{ChargePointIdentity, ConnectorKey};

/// Descriptive information a charge point reports at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargePointInfo {
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
}

/// A registered charge point.
///
/// Created on the first successful boot notification; the identity
/// resolves to this record via the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargePoint {
    pub id: i64,
    pub identity: ChargePointIdentity,
    pub registered_at: DateTime<Utc>,
    pub info: ChargePointInfo,
}

impl ChargePoint {
    pub fn new(id: i64, identity: ChargePointIdentity, info: ChargePointInfo) -> Self {
        Self {
            id,
            identity,
            registered_at: Utc::now(),
            info,
        }
    }
}

/// Connector status as reported by status notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorStatus {
    Available,
    Preparing,
    Charging,
    #[serde(rename = "SuspendedEVSE")]
    SuspendedEvse,
    #[serde(rename = "SuspendedEV")]
    SuspendedEv,
    Finishing,
    Reserved,
    Unavailable,
    Faulted,
}

/// Error codes a charge point may attach to a status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorErrorCode {
    ConnectorLockFailure,
    #[serde(rename = "EVCommunicationError")]
    EvCommunicationError,
    GroundFailure,
    HighTemperature,
    InternalError,
    LocalListConflict,
    NoError,
    OtherError,
    OverCurrentFailure,
    OverVoltage,
    PowerMeterFailure,
    PowerSwitchFailure,
    ReaderFailure,
    ResetFailure,
    UnderVoltage,
    WeakSignal,
}

/// Latest known state of one connector.
///
/// Keyed by `(charge_point_id, connector_id)`; connector id 0 denotes the
/// charge point itself. Created lazily on the first status report and
/// overwritten by every subsequent one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargePointConnector {
    pub charge_point_id: i64,
    pub connector_id: u32,
    pub status: ConnectorStatus,
    pub error_code: ConnectorErrorCode,
    pub timestamp: DateTime<Utc>,
    pub info: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_error_code: Option<String>,
}

impl ChargePointConnector {
    pub fn key(&self) -> ConnectorKey {
        ConnectorKey::new(self.charge_point_id, self.connector_id)
    }

    /// Overwrite everything but the key with a newer report.
    pub fn apply(&mut self, update: &ChargePointConnector) {
        self.status = update.status;
        self.error_code = update.error_code;
        self.timestamp = update.timestamp;
        self.info = update.info.clone();
        self.vendor_id = update.vendor_id.clone();
        self.vendor_error_code = update.vendor_error_code.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_apply_keeps_key() {
        let mut rec = ChargePointConnector {
            charge_point_id: 1,
            connector_id: 2,
            status: ConnectorStatus::Available,
            error_code: ConnectorErrorCode::NoError,
            timestamp: Utc::now(),
            info: None,
            vendor_id: None,
            vendor_error_code: None,
        };
        let update = ChargePointConnector {
            charge_point_id: 9,
            connector_id: 0,
            status: ConnectorStatus::Charging,
            error_code: ConnectorErrorCode::NoError,
            timestamp: Utc::now(),
            info: Some("plugged".into()),
            vendor_id: None,
            vendor_error_code: None,
        };
        rec.apply(&update);
        assert_eq!(rec.charge_point_id, 1);
        assert_eq!(rec.connector_id, 2);
        assert_eq!(rec.status, ConnectorStatus::Charging);
        assert_eq!(rec.info.as_deref(), Some("plugged"));
    }

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&ConnectorStatus::SuspendedEvse).unwrap();
        assert_eq!(json, r#""SuspendedEVSE""#);
        let parsed: ConnectorStatus = serde_json::from_str(r#""SuspendedEV""#).unwrap();
        assert_eq!(parsed, ConnectorStatus::SuspendedEv);
    }
}
