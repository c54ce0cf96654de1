//! Core domain entities, value types and reference data

pub mod action;
pub mod charge_point;
pub mod charging_profile;
pub mod configuration_key;
pub mod error;
pub mod identity;
pub mod session;
pub mod version;

pub use action::{resolve, ActionKey, ActionName, MessageDirection};
pub use charge_point::{
    ChargePoint, ChargePointConnector, ChargePointInfo, ConnectorErrorCode, ConnectorStatus,
};
pub use charging_profile::{
    ChargingProfile, ChargingRateUnit, ChargingScheduleInfo, ChargingSchedulePeriod,
};
pub use configuration_key::{ConfigurationKey, FeatureProfile, KeyType};
pub use error::{DomainError, DomainResult};
pub use identity::{ChargePointIdentity, ConnectorKey, CHARGE_POINT_CONNECTOR_ID};
pub use session::{
    ChargeSession, Measurand, Phase, ReadingContext, ReadingLocation, SampledValue,
    SessionEndReason, UnitOfMeasure,
};
pub use version::OcppVersion;
