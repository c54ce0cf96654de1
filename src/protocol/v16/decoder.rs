//! OCPP 1.6 decoder
//!
//! Structural decoding via serde, followed by the declarative field
//! constraints on the payload types (CiString sizes, ranges). The
//! constraint pass is what distinguishes a `SchemaValidation` failure
//! from a `FormationViolation`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use super::Payload;
use crate::domain::{ActionKey, MessageDirection, OcppVersion};
use crate::protocol::decoder::{is_empty_payload, PayloadDecoder};
use crate::protocol::error::OcppError;

/// Decoder for OCPP 1.6 payloads.
pub struct V16Decoder;

impl PayloadDecoder for V16Decoder {
    fn version(&self) -> OcppVersion {
        OcppVersion::V16
    }

    fn decode(
        &self,
        action: &ActionKey,
        for_result: bool,
        raw: &Value,
    ) -> Result<Option<crate::protocol::Payload>, OcppError> {
        if action.version != OcppVersion::V16 {
            return Err(OcppError::not_supported(format!(
                "Action {} is not an OCPP 1.6 action",
                action
            )));
        }
        if is_empty_payload(raw) {
            return Ok(None);
        }

        let payload = match (action.direction, for_result) {
            (MessageDirection::CentralBound, false) => decode_request(action.name, raw)?,
            (MessageDirection::ChargePointBound, true) => decode_result(action.name, raw)?,
            _ => {
                return Err(OcppError::not_supported(format!(
                    "No decodable shape for {} with for_result={}",
                    action, for_result
                )))
            }
        };

        Ok(Some(crate::protocol::Payload::V16(payload)))
    }
}

fn decode_request(name: &str, raw: &Value) -> Result<Payload, OcppError> {
    Ok(match name {
        "BootNotification" => Payload::BootNotification(validated(raw)?),
        "Authorize" => Payload::Authorize(validated(raw)?),
        "StartTransaction" => Payload::StartTransaction(validated(raw)?),
        "StopTransaction" => Payload::StopTransaction(validated(raw)?),
        "MeterValues" => Payload::MeterValues(validated(raw)?),
        "StatusNotification" => Payload::StatusNotification(validated(raw)?),
        "DiagnosticsStatusNotification" => {
            Payload::DiagnosticsStatusNotification(validated(raw)?)
        }
        "FirmwareStatusNotification" => Payload::FirmwareStatusNotification(validated(raw)?),
        "DataTransfer" => Payload::DataTransfer(validated(raw)?),
        other => {
            return Err(OcppError::not_supported(format!(
                "No 1.6 request shape for action {}",
                other
            )))
        }
    })
}

fn decode_result(name: &str, raw: &Value) -> Result<Payload, OcppError> {
    Ok(match name {
        "RemoteStartTransaction" => Payload::RemoteStartTransactionResult(structural(raw)?),
        "RemoteStopTransaction" => Payload::RemoteStopTransactionResult(structural(raw)?),
        "Reset" => Payload::ResetResult(structural(raw)?),
        "UnlockConnector" => Payload::UnlockConnectorResult(structural(raw)?),
        "GetConfiguration" => Payload::GetConfigurationResult(structural(raw)?),
        "ChangeConfiguration" => Payload::ChangeConfigurationResult(structural(raw)?),
        "ClearCache" => Payload::ClearCacheResult(structural(raw)?),
        "ChangeAvailability" => Payload::ChangeAvailabilityResult(structural(raw)?),
        "TriggerMessage" => Payload::TriggerMessageResult(structural(raw)?),
        "SetChargingProfile" => Payload::SetChargingProfileResult(structural(raw)?),
        other => {
            return Err(OcppError::not_supported(format!(
                "No 1.6 result shape for action {}",
                other
            )))
        }
    })
}

/// Structural decode only.
fn structural<T: DeserializeOwned>(raw: &Value) -> Result<T, OcppError> {
    serde_json::from_value(raw.clone()).map_err(|e| OcppError::formation_violation(e.to_string()))
}

/// Structural decode followed by the declared field constraints.
fn validated<T: DeserializeOwned + Validate>(raw: &Value) -> Result<T, OcppError> {
    let value: T = structural(raw)?;
    value
        .validate()
        .map_err(|e| OcppError::schema_validation(first_message(&e), raw.clone()))?;
    Ok(value)
}

fn first_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .next()
        .map(|(field, field_errors)| {
            let code = field_errors
                .first()
                .map(|e| e.code.as_ref())
                .unwrap_or("invalid");
            format!("Field '{}' violates constraint '{}'", field, code)
        })
        .unwrap_or_else(|| "Schema validation failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::v16::{CentralAction, ChargePointAction};
    use crate::protocol::error::ErrorKind;
    use serde_json::json;

    fn decode(action: ActionKey, for_result: bool, raw: Value) -> Result<Option<crate::protocol::Payload>, OcppError> {
        V16Decoder.decode(&action, for_result, &raw)
    }

    #[test]
    fn empty_object_is_no_payload() {
        let decoded = decode(CentralAction::Heartbeat.key(), false, json!({})).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn null_is_no_payload() {
        let decoded = decode(CentralAction::Heartbeat.key(), false, Value::Null).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn valid_start_transaction_decodes() {
        let raw = json!({
            "connectorId": 1,
            "idTag": "TAG-1",
            "meterStart": 1000,
            "timestamp": "2024-06-01T10:00:00Z"
        });
        let decoded = decode(CentralAction::StartTransaction.key(), false, raw)
            .unwrap()
            .unwrap();
        match decoded {
            crate::protocol::Payload::V16(Payload::StartTransaction(req)) => {
                assert_eq!(req.connector_id, 1);
                assert_eq!(req.meter_start, 1000);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn wrong_field_type_is_formation_violation() {
        let raw = json!({
            "connectorId": "one",
            "idTag": "TAG-1",
            "meterStart": 1000,
            "timestamp": "2024-06-01T10:00:00Z"
        });
        let err = decode(CentralAction::StartTransaction.key(), false, raw).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FormationViolation);
    }

    #[test]
    fn constraint_breach_is_schema_validation_with_original_payload() {
        let raw = json!({
            "connectorId": 0,
            "idTag": "TAG-1",
            "meterStart": 1000,
            "timestamp": "2024-06-01T10:00:00Z"
        });
        let err = decode(CentralAction::StartTransaction.key(), false, raw.clone()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SchemaValidation);
        assert_eq!(err.details, Some(raw));
    }

    #[test]
    fn result_shape_selected_by_for_result() {
        let raw = json!({"status": "Accepted"});
        let decoded = decode(ChargePointAction::RemoteStartTransaction.key(), true, raw)
            .unwrap()
            .unwrap();
        assert!(matches!(
            decoded,
            crate::protocol::Payload::V16(Payload::RemoteStartTransactionResult(_))
        ));
    }

    #[test]
    fn request_shape_refused_for_result_direction() {
        let raw = json!({"idTag": "TAG-1"});
        let err = decode(CentralAction::Authorize.key(), true, raw).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotSupported);
    }
}
