//! Charge session and sampled-value domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::ConnectorKey;

/// Reason a charging session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEndReason {
    DeAuthorized,
    EmergencyStop,
    #[serde(rename = "EVDisconnected")]
    EvDisconnected,
    HardReset,
    Local,
    Other,
    PowerLoss,
    Reboot,
    Remote,
    SoftReset,
    UnlockCommand,
}

/// One charging event from start to stop.
///
/// A session is "incomplete" while `ended` is unset. For a given
/// `(charge_point_id, connector_id)` at most one incomplete session exists
/// at a time; the session manager enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSession {
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub auth_id: String,
    pub charge_point_id: i64,
    pub connector_id: u32,
    /// Transaction id echoed on the wire; unique per charge point.
    pub transaction_id: String,
    pub meter_start: i32,
    pub meter_end: Option<i32>,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    /// Set once the session has been uploaded downstream.
    pub posted: Option<DateTime<Utc>>,
    pub end_reason: Option<SessionEndReason>,
}

impl ChargeSession {
    pub fn new(
        auth_id: impl Into<String>,
        charge_point_id: i64,
        connector_id: u32,
        transaction_id: impl Into<String>,
        meter_start: i32,
        started: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created: now,
            auth_id: auth_id.into(),
            charge_point_id,
            connector_id,
            transaction_id: transaction_id.into(),
            meter_start,
            meter_end: None,
            started: started.or(Some(now)),
            ended: None,
            posted: None,
            end_reason: None,
        }
    }

    pub fn connector_key(&self) -> ConnectorKey {
        ConnectorKey::new(self.charge_point_id, self.connector_id)
    }

    pub fn is_incomplete(&self) -> bool {
        self.ended.is_none()
    }

    /// The wire-level numeric transaction id, if the stored form is numeric.
    pub fn numeric_transaction_id(&self) -> Option<i64> {
        self.transaction_id.parse().ok()
    }

    pub fn end(
        &mut self,
        meter_end: i32,
        timestamp: Option<DateTime<Utc>>,
        reason: Option<SessionEndReason>,
    ) {
        self.meter_end = Some(meter_end);
        self.ended = timestamp.or_else(|| Some(Utc::now()));
        self.end_reason = reason;
    }

    pub fn mark_posted(&mut self) {
        self.posted = Some(Utc::now());
    }

    /// Energy delivered over the whole session, in the meter's unit.
    pub fn energy_delivered(&self) -> Option<i32> {
        self.meter_end.map(|end| end - self.meter_start)
    }
}

// ── Sampled values ─────────────────────────────────────────────

/// Circumstance under which a reading was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingContext {
    #[serde(rename = "Interruption.Begin")]
    InterruptionBegin,
    #[serde(rename = "Interruption.End")]
    InterruptionEnd,
    Other,
    #[serde(rename = "Sample.Clock")]
    SampleClock,
    #[serde(rename = "Sample.Periodic")]
    SamplePeriodic,
    #[serde(rename = "Transaction.Begin")]
    TransactionBegin,
    #[serde(rename = "Transaction.End")]
    TransactionEnd,
    Trigger,
}

/// Where on the charging infrastructure the reading was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingLocation {
    Body,
    Cable,
    #[serde(rename = "EV")]
    Ev,
    Inlet,
    Outlet,
}

/// Measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measurand {
    #[serde(rename = "Current.Export")]
    CurrentExport,
    #[serde(rename = "Current.Import")]
    CurrentImport,
    #[serde(rename = "Current.Offered")]
    CurrentOffered,
    #[serde(rename = "Energy.Active.Export.Register")]
    EnergyActiveExportRegister,
    #[serde(rename = "Energy.Active.Import.Register")]
    EnergyActiveImportRegister,
    #[serde(rename = "Energy.Reactive.Export.Register")]
    EnergyReactiveExportRegister,
    #[serde(rename = "Energy.Reactive.Import.Register")]
    EnergyReactiveImportRegister,
    Frequency,
    #[serde(rename = "Power.Active.Export")]
    PowerActiveExport,
    #[serde(rename = "Power.Active.Import")]
    PowerActiveImport,
    #[serde(rename = "Power.Factor")]
    PowerFactor,
    #[serde(rename = "Power.Offered")]
    PowerOffered,
    #[serde(rename = "Power.Reactive.Export")]
    PowerReactiveExport,
    #[serde(rename = "Power.Reactive.Import")]
    PowerReactiveImport,
    #[serde(rename = "SoC")]
    SoC,
    Temperature,
    Voltage,
}

/// Electrical phase a reading refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    L1,
    L2,
    L3,
    N,
    #[serde(rename = "L1-N")]
    L1N,
    #[serde(rename = "L2-N")]
    L2N,
    #[serde(rename = "L3-N")]
    L3N,
    #[serde(rename = "L1-L2")]
    L1L2,
    #[serde(rename = "L2-L3")]
    L2L3,
    #[serde(rename = "L3-L1")]
    L3L1,
}

/// Unit of a sampled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOfMeasure {
    Wh,
    #[serde(rename = "kWh")]
    KWh,
    #[serde(rename = "varh")]
    Varh,
    #[serde(rename = "kvarh")]
    KVarh,
    W,
    #[serde(rename = "kW")]
    KW,
    #[serde(rename = "VA")]
    Va,
    #[serde(rename = "kVA")]
    KVa,
    #[serde(rename = "var")]
    Var,
    #[serde(rename = "kvar")]
    KVar,
    A,
    V,
    Celsius,
    Fahrenheit,
    K,
    Percent,
}

/// One metered reading.
///
/// The session id is optional: readings may arrive before or without an
/// associated transaction and are recorded unlinked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledValue {
    pub session_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub context: Option<ReadingContext>,
    pub location: Option<ReadingLocation>,
    pub measurand: Option<Measurand>,
    pub phase: Option<Phase>,
    pub unit: Option<UnitOfMeasure>,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> ChargeSession {
        ChargeSession::new("TAG-001", 1, 1, "42", 1000, None)
    }

    #[test]
    fn new_session_is_incomplete() {
        let s = sample_session();
        assert!(s.is_incomplete());
        assert!(s.started.is_some());
        assert!(s.posted.is_none());
        assert_eq!(s.numeric_transaction_id(), Some(42));
    }

    #[test]
    fn end_completes_session() {
        let mut s = sample_session();
        s.end(6000, None, Some(SessionEndReason::Local));
        assert!(!s.is_incomplete());
        assert_eq!(s.energy_delivered(), Some(5000));
        assert_eq!(s.end_reason, Some(SessionEndReason::Local));
    }

    #[test]
    fn reported_start_time_is_echoed() {
        let reported = Utc::now() - chrono::Duration::minutes(5);
        let s = ChargeSession::new("TAG", 1, 1, "1", 0, Some(reported));
        assert_eq!(s.started, Some(reported));
    }

    #[test]
    fn measurand_wire_names() {
        let json = serde_json::to_string(&Measurand::EnergyActiveImportRegister).unwrap();
        assert_eq!(json, r#""Energy.Active.Import.Register""#);
        let parsed: UnitOfMeasure = serde_json::from_str(r#""kWh""#).unwrap();
        assert_eq!(parsed, UnitOfMeasure::KWh);
    }
}
