//! Message envelope and result delivery
//!
//! An [`Envelope`] carries one decoded call through the dispatcher to its
//! processors. Each envelope owns one [`ResultSink`]; the first delivery
//! through the sink wins, later deliveries are discarded so that
//! observer processors running after the winner cannot overwrite the
//! outcome.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use super::error::OcppError;
use super::Payload;
use crate::domain::{ActionKey, ChargePointIdentity};

/// One decoded call travelling through the dispatcher.
#[derive(Debug)]
pub struct Envelope {
    pub origin: ChargePointIdentity,
    pub action: ActionKey,
    pub correlation_id: String,
    /// Decoded payload; `None` for actions with an empty payload.
    pub message: Option<Payload>,
}

/// Outcome of one dispatched call: exactly one of result or error.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Result(Value),
    Error(OcppError),
}

/// Single-delivery outcome slot for one envelope.
pub struct ResultSink {
    outcome: Mutex<Option<CallOutcome>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
        }
    }

    /// Deliver a successful result. Returns `true` if this delivery won
    /// (i.e. no outcome had been delivered yet).
    pub fn deliver_result<T: Serialize>(&self, response: &T) -> bool {
        match serde_json::to_value(response) {
            Ok(value) => self.deliver(CallOutcome::Result(value)),
            Err(e) => self.deliver(CallOutcome::Error(OcppError::internal(format!(
                "Failed to serialize response: {}",
                e
            )))),
        }
    }

    /// Deliver an error outcome. Returns `true` if this delivery won.
    pub fn deliver_error(&self, error: OcppError) -> bool {
        self.deliver(CallOutcome::Error(error))
    }

    pub fn is_delivered(&self) -> bool {
        self.outcome.lock().expect("sink lock poisoned").is_some()
    }

    /// Take the delivered outcome, if any. Called once by the dispatcher
    /// after every processor has run.
    pub fn take(&self) -> Option<CallOutcome> {
        self.outcome.lock().expect("sink lock poisoned").take()
    }

    fn deliver(&self, outcome: CallOutcome) -> bool {
        let mut slot = self.outcome.lock().expect("sink lock poisoned");
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        true
    }
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}
