//! TransactionEvent processor (OCPP 2.0.1)
//!
//! Maps the 2.0.1 transaction lifecycle onto the session manager:
//! `Started` opens a session under the charging station's own transaction
//! id, `Updated` records meter samples against it, `Ended` closes it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::authorization::AuthorizationStatus;
use crate::domain::action::v201;
use crate::domain::{ActionKey, DomainError, Measurand, SampledValue, SessionEndReason};
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::engine::sessions::{ChargeSessionManager, SessionError, StartSessionInfo};
use crate::protocol::{v201 as p201, Envelope, OcppError, Payload, ResultSink};
use crate::store::Store;

fn end_reason(stopped_reason: Option<&str>) -> Option<SessionEndReason> {
    stopped_reason.map(|reason| match reason {
        "DeAuthorized" => SessionEndReason::DeAuthorized,
        "EmergencyStop" => SessionEndReason::EmergencyStop,
        "EVDisconnected" => SessionEndReason::EvDisconnected,
        "Local" => SessionEndReason::Local,
        "PowerLoss" => SessionEndReason::PowerLoss,
        "Reboot" => SessionEndReason::Reboot,
        "Remote" => SessionEndReason::Remote,
        _ => SessionEndReason::Other,
    })
}

fn flatten_samples(session_id: Option<Uuid>, batches: &[p201::MeterValue]) -> Vec<SampledValue> {
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

/// The energy register value at transaction start, when reported.
fn meter_start_from(batches: Option<&Vec<p201::MeterValue>>) -> i32 {
    batches
        .into_iter()
        .flatten()
        .flat_map(|batch| batch.sampled_value.iter())
        .find(|sample| {
            sample
                .measurand
                .map_or(true, |m| m == Measurand::EnergyActiveImportRegister)
        })
        .map(|sample| sample.value as i32)
        .unwrap_or(0)
}

pub struct TransactionEventProcessor {
    sessions: Arc<ChargeSessionManager>,
    store: Arc<dyn Store>,
}

impl TransactionEventProcessor {
    pub fn new(sessions: Arc<ChargeSessionManager>, store: Arc<dyn Store>) -> Self {
        Self { sessions, store }
    }

    fn respond(sink: &ResultSink, status: Option<AuthorizationStatus>) {
        sink.deliver_result(&p201::TransactionEventResponse {
            id_token_info: status.map(|status| p201::IdTokenInfo {
                status: status.into(),
            }),
        });
    }

    async fn on_started(
        &self,
        envelope: &Envelope,
        charge_point_id: i64,
        request: &p201::TransactionEventRequest,
        sink: &ResultSink,
    ) -> Result<(), ProcessError> {
        let auth_id = request
            .id_token
            .as_ref()
            .map(|token| token.id_token.clone())
            .unwrap_or_default();
        let connector_id = request
            .evse
            .as_ref()
            .and_then(|evse| evse.connector_id.or(Some(evse.id)))
            .unwrap_or(1);

        let outcome = self
            .sessions
            .start_charging_session(StartSessionInfo {
                identity: envelope.origin.clone(),
                charge_point_id,
                connector_id,
                auth_id,
                meter_start: meter_start_from(request.meter_value.as_ref()),
                started: Some(request.timestamp),
                reservation_id: None,
                transaction_id: Some(request.transaction_info.transaction_id.clone()),
            })
            .await;

        match outcome {
            Ok(session) => {
                info!(
                    origin = %envelope.origin,
                    transaction_id = session.transaction_id.as_str(),
                    "Transaction event: started"
                );
                Self::respond(sink, Some(AuthorizationStatus::Accepted));
            }
            Err(SessionError::Unauthorized(auth)) => {
                warn!(
                    origin = %envelope.origin,
                    status = ?auth.status,
                    "Transaction event refused"
                );
                Self::respond(sink, Some(auth.status));
            }
            Err(SessionError::Domain(e)) => return Err(e.into()),
        }
        Ok(())
    }

    async fn on_updated(
        &self,
        envelope: &Envelope,
        charge_point_id: i64,
        request: &p201::TransactionEventRequest,
        sink: &ResultSink,
    ) -> Result<(), ProcessError> {
        let session = self
            .sessions
            .get_active_charging_session(charge_point_id, &request.transaction_info.transaction_id)
            .await?;
        if let Some(batches) = &request.meter_value {
            let readings = flatten_samples(session.map(|s| s.id), batches);
            if !readings.is_empty() {
                self.sessions.add_charging_session_readings(readings).await?;
            }
        }
        info!(
            origin = %envelope.origin,
            transaction_id = request.transaction_info.transaction_id.as_str(),
            "Transaction event: updated"
        );
        Self::respond(sink, None);
        Ok(())
    }

    async fn on_ended(
        &self,
        envelope: &Envelope,
        charge_point_id: i64,
        request: &p201::TransactionEventRequest,
        sink: &ResultSink,
    ) -> Result<(), ProcessError> {
        let meter_end = meter_start_from(request.meter_value.as_ref());
        let outcome = self
            .sessions
            .end_charging_session(
                charge_point_id,
                &request.transaction_info.transaction_id,
                meter_end,
                Some(request.timestamp),
                end_reason(request.transaction_info.stopped_reason.as_deref()),
            )
            .await;
        match outcome {
            Ok(_) => {
                info!(
                    origin = %envelope.origin,
                    transaction_id = request.transaction_info.transaction_id.as_str(),
                    "Transaction event: ended"
                );
            }
            Err(SessionError::Domain(DomainError::SessionNotFound { .. })) => {
                warn!(
                    origin = %envelope.origin,
                    transaction_id = request.transaction_info.transaction_id.as_str(),
                    "Ended event for unknown transaction"
                );
            }
            Err(e) => return Err(e.into()),
        }
        Self::respond(sink, None);
        Ok(())
    }
}

#[async_trait]
impl ActionProcessor for TransactionEventProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![v201::CentralAction::TransactionEvent.key()]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        let Some(Payload::V201(p201::Payload::TransactionEvent(request))) = &envelope.message
        else {
            sink.deliver_error(OcppError::formation_violation(
                "TransactionEvent requires a payload",
            ));
            return Ok(());
        };

        let Some(charge_point) = super::resolve_charge_point(&self.store, &envelope.origin).await?
        else {
            warn!(
                origin = %envelope.origin,
                "Transaction event from unregistered charge point"
            );
            Self::respond(sink, Some(AuthorizationStatus::Invalid));
            return Ok(());
        };

        match request.event_type {
            p201::TransactionEventType::Started => {
                self.on_started(envelope, charge_point.id, request, sink).await
            }
            p201::TransactionEventType::Updated => {
                self.on_updated(envelope, charge_point.id, request, sink).await
            }
            p201::TransactionEventType::Ended => {
                self.on_ended(envelope, charge_point.id, request, sink).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::StaticAuthorizationService;
    use crate::domain::{ChargePoint, ChargePointIdentity, ChargePointInfo};
    use crate::engine::sessions::SessionConfig;
    use crate::protocol::CallOutcome;
    use crate::store::InMemoryStore;
    use chrono::Utc;

    struct Fixture {
        processor: TransactionEventProcessor,
        sessions: Arc<ChargeSessionManager>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let id = store.next_charge_point_id().await;
        store
            .save_charge_point(ChargePoint::new(
                id,
                ChargePointIdentity::new("CS001", None),
                ChargePointInfo {
                    vendor: "Acme".into(),
                    model: "Two".into(),
                    serial_number: None,
                    firmware_version: None,
                },
            ))
            .await
            .unwrap();
        let sessions = Arc::new(ChargeSessionManager::new(
            store.clone(),
            Arc::new(StaticAuthorizationService::with_accepted(["TOKEN-1"])),
            SessionConfig::default(),
        ));
        Fixture {
            processor: TransactionEventProcessor::new(sessions.clone(), store),
            sessions,
        }
    }

    fn event(
        event_type: p201::TransactionEventType,
        transaction_id: &str,
        token: Option<&str>,
    ) -> Envelope {
        Envelope {
            origin: ChargePointIdentity::new("CS001", None),
            action: v201::CentralAction::TransactionEvent.key(),
            correlation_id: "m1".into(),
            message: Some(Payload::V201(p201::Payload::TransactionEvent(
                p201::TransactionEventRequest {
                    event_type,
                    timestamp: Utc::now(),
                    trigger_reason: "Authorized".into(),
                    seq_no: 0,
                    transaction_info: p201::TransactionInfo {
                        transaction_id: transaction_id.into(),
                        charging_state: None,
                        stopped_reason: None,
                    },
                    evse: Some(p201::Evse {
                        id: 1,
                        connector_id: Some(1),
                    }),
                    id_token: token.map(|t| p201::IdToken {
                        id_token: t.into(),
                        token_type: "ISO14443".into(),
                    }),
                    meter_value: None,
                },
            ))),
        }
    }

    #[tokio::test]
    async fn started_event_opens_session_under_station_transaction_id() {
        let f = fixture().await;
        let sink = ResultSink::new();
        f.processor
            .process(
                &event(p201::TransactionEventType::Started, "tx-abc", Some("TOKEN-1")),
                &sink,
            )
            .await
            .unwrap();
        match sink.take() {
            Some(CallOutcome::Result(value)) => {
                assert_eq!(value["idTokenInfo"]["status"], "Accepted");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let session = f
            .sessions
            .get_active_charging_session(1, "tx-abc")
            .await
            .unwrap();
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn ended_event_closes_session() {
        let f = fixture().await;
        let sink = ResultSink::new();
        f.processor
            .process(
                &event(p201::TransactionEventType::Started, "tx-abc", Some("TOKEN-1")),
                &sink,
            )
            .await
            .unwrap();

        let sink = ResultSink::new();
        f.processor
            .process(&event(p201::TransactionEventType::Ended, "tx-abc", None), &sink)
            .await
            .unwrap();
        assert!(matches!(sink.take(), Some(CallOutcome::Result(_))));

        let session = f
            .sessions
            .get_active_charging_session(1, "tx-abc")
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn unknown_token_is_refused() {
        let f = fixture().await;
        let sink = ResultSink::new();
        f.processor
            .process(
                &event(p201::TransactionEventType::Started, "tx-x", Some("NOBODY")),
                &sink,
            )
            .await
            .unwrap();
        match sink.take() {
            Some(CallOutcome::Result(value)) => {
                assert_eq!(value["idTokenInfo"]["status"], "Invalid");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
