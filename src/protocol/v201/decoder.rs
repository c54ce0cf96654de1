//! OCPP 2.0.1 decoder
//!
//! Structural decoding via serde, followed by validation of the raw
//! document against the per-action descriptor tables in [`super::schema`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::schema;
use super::Payload;
use crate::domain::{ActionKey, MessageDirection, OcppVersion};
use crate::protocol::decoder::{is_empty_payload, PayloadDecoder};
use crate::protocol::error::OcppError;

/// Decoder for OCPP 2.0.1 payloads.
pub struct V201Decoder;

impl PayloadDecoder for V201Decoder {
    fn version(&self) -> OcppVersion {
        OcppVersion::V201
    }

    fn decode(
        &self,
        action: &ActionKey,
        for_result: bool,
        raw: &Value,
    ) -> Result<Option<crate::protocol::Payload>, OcppError> {
        if action.version != OcppVersion::V201 {
            return Err(OcppError::not_supported(format!(
                "Action {} is not an OCPP 2.0.1 action",
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

        Ok(Some(crate::protocol::Payload::V201(payload)))
    }
}

fn decode_request(name: &str, raw: &Value) -> Result<Payload, OcppError> {
    let payload = match name {
        "BootNotification" => Payload::BootNotification(structural(raw)?),
        "Authorize" => Payload::Authorize(structural(raw)?),
        "StatusNotification" => Payload::StatusNotification(structural(raw)?),
        "MeterValues" => Payload::MeterValues(structural(raw)?),
        "TransactionEvent" => Payload::TransactionEvent(structural(raw)?),
        other => {
            return Err(OcppError::not_supported(format!(
                "No 2.0.1 request shape for action {}",
                other
            )))
        }
    };
    check_schema(name, false, raw)?;
    Ok(payload)
}

fn decode_result(name: &str, raw: &Value) -> Result<Payload, OcppError> {
    let payload = match name {
        "RequestStartTransaction" => Payload::RequestStartTransactionResult(structural(raw)?),
        "RequestStopTransaction" => Payload::RequestStopTransactionResult(structural(raw)?),
        "Reset" => Payload::ResetResult(structural(raw)?),
        "GetVariables" => Payload::GetVariablesResult(structural(raw)?),
        "SetVariables" => Payload::SetVariablesResult(structural(raw)?),
        other => {
            return Err(OcppError::not_supported(format!(
                "No 2.0.1 result shape for action {}",
                other
            )))
        }
    };
    check_schema(name, true, raw)?;
    Ok(payload)
}

fn structural<T: DeserializeOwned>(raw: &Value) -> Result<T, OcppError> {
    serde_json::from_value(raw.clone()).map_err(|e| OcppError::formation_violation(e.to_string()))
}

fn check_schema(name: &str, for_result: bool, raw: &Value) -> Result<(), OcppError> {
    if let Some(table) = schema::schema_for(name, for_result) {
        schema::validate_document(raw, table)
            .map_err(|message| OcppError::schema_validation(message, raw.clone()))?;
    }
    Ok(())
}
