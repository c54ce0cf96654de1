//! MeterValues processor
//!
//! Readings are always persisted: when the reported transaction id maps
//! to an active session each reading is stamped with that session's id,
//! otherwise readings are recorded unlinked. A lost transaction
//! reference is not an error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::action::{v16, v201};
use crate::domain::{ActionKey, SampledValue};
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::engine::sessions::ChargeSessionManager;
use crate::protocol::{v16 as p16, v201 as p201, Envelope, OcppError, Payload, ResultSink};
use crate::store::Store;

/// Flatten 1.6 wire meter values into domain readings, stamping each with
/// `session_id`.
pub(crate) fn flatten_meter_values(
    session_id: Option<Uuid>,
    batches: &[p16::MeterValue],
) -> Vec<SampledValue> {
    batches
        .iter()
        .flat_map(|batch| {
            batch.sampled_value.iter().map(move |sample| SampledValue {
                session_id,
                timestamp: batch.timestamp,
                context: sample.context,
                location: sample.location,
                measurand: sample.measurand,
                phase: sample.phase,
                unit: sample.unit,
                value: sample.value.clone(),
            })
        })
        .collect()
}

fn flatten_v201_meter_values(
    session_id: Option<Uuid>,
    batches: &[p201::MeterValue],
) -> Vec<SampledValue> {
    batches
        .iter()
        .flat_map(|batch| {
            batch.sampled_value.iter().map(move |sample| SampledValue {
                session_id,
                timestamp: batch.timestamp,
                context: sample.context,
                location: sample.location,
                measurand: sample.measurand,
                phase: sample.phase,
                unit: None,
                value: sample.value.to_string(),
            })
        })
        .collect()
}

pub struct MeterValuesProcessor {
    sessions: Arc<ChargeSessionManager>,
    store: Arc<dyn Store>,
}

impl MeterValuesProcessor {
    pub fn new(sessions: Arc<ChargeSessionManager>, store: Arc<dyn Store>) -> Self {
        Self { sessions, store }
    }
}

#[async_trait]
impl ActionProcessor for MeterValuesProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![
            v16::CentralAction::MeterValues.key(),
            v201::CentralAction::MeterValues.key(),
        ]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        match &envelope.message {
            Some(Payload::V16(p16::Payload::MeterValues(request))) => {
                let charge_point =
                    super::resolve_charge_point(&self.store, &envelope.origin).await?;

                // Resolve the session only when a transaction id was
                // reported; absence (or a stale id) leaves readings
                // unlinked.
                let session_id = match (&charge_point, request.transaction_id) {
                    (Some(cp), Some(transaction_id)) => self
                        .sessions
                        .get_active_charging_session(cp.id, &transaction_id.to_string())
                        .await?
                        .map(|session| session.id),
                    _ => None,
                };
                if request.transaction_id.is_some() && session_id.is_none() {
                    warn!(
                        origin = %envelope.origin,
                        transaction_id = ?request.transaction_id,
                        "Meter values for unknown transaction; recording unlinked"
                    );
                }

                let readings = flatten_meter_values(session_id, &request.meter_value);
                let count = self.sessions.add_charging_session_readings(readings).await?;
                info!(
                    origin = %envelope.origin,
                    connector_id = request.connector_id,
                    count,
                    linked = session_id.is_some(),
                    "Recorded meter values"
                );
                sink.deliver_result(&p16::MeterValuesResponse {});
            }
            Some(Payload::V201(p201::Payload::MeterValues(request))) => {
                // 2.0.1 meter values carry no transaction reference;
                // transaction-linked samples arrive via TransactionEvent.
                let readings = flatten_v201_meter_values(None, &request.meter_value);
                let count = self.sessions.add_charging_session_readings(readings).await?;
                info!(
                    origin = %envelope.origin,
                    evse_id = request.evse_id,
                    count,
                    "Recorded meter values"
                );
                sink.deliver_result(&p201::MeterValuesResponse {});
            }
            _ => {
                sink.deliver_error(OcppError::formation_violation(
                    "MeterValues requires a payload",
                ));
            }
        }
        Ok(())
    }
}
