//! OCPP 2.0.1 schema descriptors
//!
//! The 2.0.1 schema ships as a set of per-action JSON Schema documents.
//! This module carries the subset the engine enforces as data-driven
//! descriptor tables: required top-level fields, their JSON types and
//! string length caps. Unknown extra fields pass through, matching the
//! permissive behavior of the published schemas.

use serde_json::Value;

/// JSON type tag for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Descriptor for one top-level field of an action payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub max_len: Option<usize>,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
        max_len: None,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
        max_len: None,
    }
}

const BOOT_NOTIFICATION: &[FieldSpec] = &[
    required("chargingStation", FieldKind::Object),
    required("reason", FieldKind::String),
];

const AUTHORIZE: &[FieldSpec] = &[required("idToken", FieldKind::Object)];

const STATUS_NOTIFICATION: &[FieldSpec] = &[
    required("timestamp", FieldKind::String),
    required("connectorStatus", FieldKind::String),
    required("evseId", FieldKind::Integer),
    required("connectorId", FieldKind::Integer),
];

const METER_VALUES: &[FieldSpec] = &[
    required("evseId", FieldKind::Integer),
    required("meterValue", FieldKind::Array),
];

const TRANSACTION_EVENT: &[FieldSpec] = &[
    required("eventType", FieldKind::String),
    required("timestamp", FieldKind::String),
    FieldSpec {
        name: "triggerReason",
        kind: FieldKind::String,
        required: true,
        max_len: Some(50),
    },
    required("seqNo", FieldKind::Integer),
    required("transactionInfo", FieldKind::Object),
    optional("evse", FieldKind::Object),
    optional("idToken", FieldKind::Object),
    optional("meterValue", FieldKind::Array),
];

const REQUEST_START_RESULT: &[FieldSpec] = &[
    required("status", FieldKind::String),
    optional("transactionId", FieldKind::String),
];

const REQUEST_STOP_RESULT: &[FieldSpec] = &[required("status", FieldKind::String)];

const RESET_RESULT: &[FieldSpec] = &[required("status", FieldKind::String)];

const GET_VARIABLES_RESULT: &[FieldSpec] = &[required("getVariableResult", FieldKind::Array)];

const SET_VARIABLES_RESULT: &[FieldSpec] = &[required("setVariableResult", FieldKind::Array)];

/// Look up the descriptor table for `(action, for_result)`.
pub(crate) fn schema_for(action: &str, for_result: bool) -> Option<&'static [FieldSpec]> {
    match (action, for_result) {
        ("BootNotification", false) => Some(BOOT_NOTIFICATION),
        ("Authorize", false) => Some(AUTHORIZE),
        ("StatusNotification", false) => Some(STATUS_NOTIFICATION),
        ("MeterValues", false) => Some(METER_VALUES),
        ("TransactionEvent", false) => Some(TRANSACTION_EVENT),
        ("RequestStartTransaction", true) => Some(REQUEST_START_RESULT),
        ("RequestStopTransaction", true) => Some(REQUEST_STOP_RESULT),
        ("Reset", true) => Some(RESET_RESULT),
        ("GetVariables", true) => Some(GET_VARIABLES_RESULT),
        ("SetVariables", true) => Some(SET_VARIABLES_RESULT),
        _ => None,
    }
}

/// Validate a raw payload document against a descriptor table.
///
/// Returns the first violation message.
pub(crate) fn validate_document(raw: &Value, schema: &[FieldSpec]) -> Result<(), String> {
    let object = raw
        .as_object()
        .ok_or_else(|| "Payload must be a JSON object".to_string())?;

    for field in schema {
        match object.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(format!("Required field '{}' is missing", field.name));
                }
            }
            Some(value) => {
                if !field.kind.matches(value) {
                    return Err(format!(
                        "Field '{}' must be of type {}",
                        field.name,
                        field.kind.describe()
                    ));
                }
                if let (Some(max), Some(s)) = (field.max_len, value.as_str()) {
                    if s.chars().count() > max {
                        return Err(format!(
                            "Field '{}' exceeds maximum length {}",
                            field.name, max
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}
