//! Payload decoding contract
//!
//! One decoder exists per protocol major version. Both satisfy the same
//! contract: select the concrete request/response shape from
//! `(action, for_result)`, decode structurally, then validate against the
//! version's schema representation. The two implementations share no code
//! beyond this trait — their schema representations differ.

use serde_json::Value;

use super::error::OcppError;
use super::Payload;
use crate::domain::{ActionKey, OcppVersion};

/// Per-version payload decoder and validator.
pub trait PayloadDecoder: Send + Sync {
    fn version(&self) -> OcppVersion;

    /// Decode `raw` into the typed payload for `action`.
    ///
    /// `for_result` selects the response shape instead of the request
    /// shape. An empty JSON object or JSON `null` is "no payload" and
    /// decodes to `None`, never an error. Failures are
    /// `FormationViolation` (structure) or `SchemaValidation` (schema,
    /// carrying the original payload).
    fn decode(
        &self,
        action: &ActionKey,
        for_result: bool,
        raw: &Value,
    ) -> Result<Option<Payload>, OcppError>;
}

/// Whether `raw` counts as "no payload".
pub fn is_empty_payload(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_empty_object_are_no_payload() {
        assert!(is_empty_payload(&Value::Null));
        assert!(is_empty_payload(&json!({})));
        assert!(!is_empty_payload(&json!({"a": 1})));
        assert!(!is_empty_payload(&json!([])));
    }
}
