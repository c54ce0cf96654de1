//! OCPP-J transport framing
//!
//! The framing is identical across protocol versions:
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<details>}]`
//!
//! The unique id is the correlation id and must round-trip through the
//! engine unchanged.

use serde_json::{json, Value};

use super::error::{ErrorKind, OcppError};

const MESSAGE_TYPE_CALL: u64 = 2;
const MESSAGE_TYPE_CALL_RESULT: u64 = 3;
const MESSAGE_TYPE_CALL_ERROR: u64 = 4;

/// A parsed OCPP-J frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call {
        correlation_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        correlation_id: String,
        payload: Value,
    },
    CallError {
        correlation_id: String,
        code: String,
        description: String,
        details: Value,
    },
}

impl Frame {
    /// Parse raw frame text.
    ///
    /// Frame-level problems surface as [`ErrorKind::ProtocolError`]; they
    /// carry no usable correlation id, so the caller cannot answer them
    /// with a call error.
    pub fn parse(text: &str) -> Result<Self, OcppError> {
        let elements: Vec<Value> = serde_json::from_str(text)
            .map_err(|e| OcppError::protocol(format!("Frame is not a JSON array: {}", e)))?;

        let message_type = elements
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| OcppError::protocol("Missing numeric message type"))?;

        let correlation_id = elements
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| OcppError::protocol("Missing correlation id"))?
            .to_string();

        match message_type {
            MESSAGE_TYPE_CALL => {
                let action = elements
                    .get(2)
                    .and_then(Value::as_str)
                    .ok_or_else(|| OcppError::protocol("Call frame is missing the action"))?
                    .to_string();
                let payload = elements.get(3).cloned().unwrap_or(Value::Null);
                Ok(Self::Call {
                    correlation_id,
                    action,
                    payload,
                })
            }
            MESSAGE_TYPE_CALL_RESULT => Ok(Self::CallResult {
                correlation_id,
                payload: elements.get(2).cloned().unwrap_or(Value::Null),
            }),
            MESSAGE_TYPE_CALL_ERROR => {
                let code = elements
                    .get(2)
                    .and_then(Value::as_str)
                    .unwrap_or(ErrorKind::GenericError.code())
                    .to_string();
                let description = elements
                    .get(3)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let details = elements.get(4).cloned().unwrap_or_else(|| json!({}));
                Ok(Self::CallError {
                    correlation_id,
                    code,
                    description,
                    details,
                })
            }
            other => Err(OcppError::protocol(format!(
                "Unknown message type: {}",
                other
            ))),
        }
    }

    /// Encode to frame text.
    pub fn serialize(&self) -> String {
        let array = match self {
            Self::Call {
                correlation_id,
                action,
                payload,
            } => json!([MESSAGE_TYPE_CALL, correlation_id, action, payload]),
            Self::CallResult {
                correlation_id,
                payload,
            } => json!([MESSAGE_TYPE_CALL_RESULT, correlation_id, payload]),
            Self::CallError {
                correlation_id,
                code,
                description,
                details,
            } => json!([
                MESSAGE_TYPE_CALL_ERROR,
                correlation_id,
                code,
                description,
                details
            ]),
        };
        // serializing a Value cannot fail
        serde_json::to_string(&array).unwrap()
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Call { correlation_id, .. }
            | Self::CallResult { correlation_id, .. }
            | Self::CallError { correlation_id, .. } => correlation_id,
        }
    }

    /// Build a call-result frame answering `correlation_id`.
    pub fn call_result(correlation_id: impl Into<String>, payload: Value) -> Self {
        Self::CallResult {
            correlation_id: correlation_id.into(),
            payload,
        }
    }

    /// Build a call-error frame answering `correlation_id`.
    pub fn call_error(correlation_id: impl Into<String>, error: &OcppError) -> Self {
        Self::CallError {
            correlation_id: correlation_id.into(),
            code: error.kind.code().to_string(),
            description: error.description.clone(),
            details: error.details.clone().unwrap_or_else(|| json!({})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_call() {
        let frame =
            Frame::parse(r#"[2,"msg-1","StatusNotification",{"connectorId":1}]"#).unwrap();
        match frame {
            Frame::Call {
                correlation_id,
                action,
                payload,
            } => {
                assert_eq!(correlation_id, "msg-1");
                assert_eq!(action, "StatusNotification");
                assert_eq!(payload["connectorId"], 1);
            }
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn parse_call_result() {
        let frame = Frame::parse(r#"[3,"msg-2",{"status":"Accepted"}]"#).unwrap();
        assert_eq!(frame.correlation_id(), "msg-2");
        assert!(matches!(frame, Frame::CallResult { .. }));
    }

    #[test]
    fn parse_call_error_defaults() {
        // A sloppy sender may omit description and details.
        let frame = Frame::parse(r#"[4,"msg-3","NotImplemented"]"#).unwrap();
        match frame {
            Frame::CallError {
                code,
                description,
                details,
                ..
            } => {
                assert_eq!(code, "NotImplemented");
                assert_eq!(description, "");
                assert_eq!(details, json!({}));
            }
            other => panic!("expected CallError, got {:?}", other),
        }
    }

    #[test]
    fn reject_unknown_message_type() {
        let err = Frame::parse(r#"[9,"msg-4",{}]"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolError);
    }

    #[test]
    fn reject_non_array() {
        assert!(Frame::parse(r#"{"not":"a frame"}"#).is_err());
    }

    #[test]
    fn correlation_id_round_trips() {
        let call = Frame::Call {
            correlation_id: "abc-123".into(),
            action: "Heartbeat".into(),
            payload: json!({}),
        };
        let reparsed = Frame::parse(&call.serialize()).unwrap();
        assert_eq!(reparsed.correlation_id(), "abc-123");

        let result = Frame::call_result(reparsed.correlation_id(), json!({"ok": true}));
        let reparsed = Frame::parse(&result.serialize()).unwrap();
        assert_eq!(reparsed.correlation_id(), "abc-123");

        let error = Frame::call_error(reparsed.correlation_id(), &OcppError::internal("x"));
        let reparsed = Frame::parse(&error.serialize()).unwrap();
        assert_eq!(reparsed.correlation_id(), "abc-123");
    }

    #[test]
    fn call_error_carries_details_payload() {
        let original = json!({"idTag": 42});
        let err = OcppError::schema_validation("idTag must be a string", original.clone());
        let frame = Frame::call_error("m", &err);
        match Frame::parse(&frame.serialize()).unwrap() {
            Frame::CallError { details, .. } => assert_eq!(details, original),
            other => panic!("expected CallError, got {:?}", other),
        }
    }
}
