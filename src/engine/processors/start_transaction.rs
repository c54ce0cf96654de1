//! StartTransaction processor
//!
//! The protocol requires a numeric transaction id in every response, so
//! authorization failures are answered, not errored: the response carries
//! the verdict's status and transaction id 0 — or the existing
//! transaction id when the conflict refers to a session that is already
//! running on the connector.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::action::v16;
use crate::domain::ActionKey;
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::engine::sessions::{ChargeSessionManager, SessionError, StartSessionInfo};
use crate::authorization::AuthorizationStatus;
use crate::protocol::{v16 as p16, Envelope, OcppError, Payload, ResultSink};
use crate::store::Store;

pub struct StartTransactionProcessor {
    sessions: Arc<ChargeSessionManager>,
    store: Arc<dyn Store>,
}

impl StartTransactionProcessor {
    pub fn new(sessions: Arc<ChargeSessionManager>, store: Arc<dyn Store>) -> Self {
        Self { sessions, store }
    }

    fn respond(sink: &ResultSink, status: AuthorizationStatus, transaction_id: i64) {
        sink.deliver_result(&p16::StartTransactionResponse {
            id_tag_info: p16::IdTagInfo::of(status),
            transaction_id,
        });
    }
}

#[async_trait]
impl ActionProcessor for StartTransactionProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![v16::CentralAction::StartTransaction.key()]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        let Some(Payload::V16(p16::Payload::StartTransaction(request))) = &envelope.message else {
            sink.deliver_error(OcppError::formation_violation(
                "StartTransaction requires a payload",
            ));
            return Ok(());
        };

        let Some(charge_point) = super::resolve_charge_point(&self.store, &envelope.origin).await?
        else {
            warn!(
                origin = %envelope.origin,
                "StartTransaction from unregistered charge point"
            );
            Self::respond(sink, AuthorizationStatus::Invalid, 0);
            return Ok(());
        };

        let outcome = self
            .sessions
            .start_charging_session(StartSessionInfo {
                identity: envelope.origin.clone(),
                charge_point_id: charge_point.id,
                connector_id: request.connector_id,
                auth_id: request.id_tag.clone(),
                meter_start: request.meter_start,
                started: Some(request.timestamp),
                reservation_id: request.reservation_id,
                transaction_id: None,
            })
            .await;

        match outcome {
            Ok(session) => {
                let transaction_id = session.numeric_transaction_id().unwrap_or_default();
                info!(
                    origin = %envelope.origin,
                    connector_id = request.connector_id,
                    transaction_id,
                    "Transaction started"
                );
                Self::respond(sink, AuthorizationStatus::Accepted, transaction_id);
            }
            Err(SessionError::Unauthorized(auth)) => {
                // Echo the existing transaction id on conflicts; zero
                // otherwise. The response always carries a number.
                let transaction_id = auth.existing_transaction_id.unwrap_or(0);
                warn!(
                    origin = %envelope.origin,
                    connector_id = request.connector_id,
                    status = ?auth.status,
                    transaction_id,
                    "Transaction refused"
                );
                Self::respond(sink, auth.status, transaction_id);
            }
            Err(SessionError::Domain(e)) => return Err(e.into()),
        }
        Ok(())
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

    async fn fixture() -> (StartTransactionProcessor, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let identity = ChargePointIdentity::new("CP001", None);
        let id = store.next_charge_point_id().await;
        store
            .save_charge_point(ChargePoint::new(
                id,
                identity,
                ChargePointInfo {
                    vendor: "Acme".into(),
                    model: "One".into(),
                    serial_number: None,
                    firmware_version: None,
                },
            ))
            .await
            .unwrap();
        let sessions = Arc::new(ChargeSessionManager::new(
            store.clone(),
            Arc::new(StaticAuthorizationService::with_accepted(["TAG-1"])),
            SessionConfig::default(),
        ));
        (
            StartTransactionProcessor::new(sessions, store.clone()),
            store,
        )
    }

    fn envelope(id_tag: &str) -> Envelope {
        Envelope {
            origin: ChargePointIdentity::new("CP001", None),
            action: v16::CentralAction::StartTransaction.key(),
            correlation_id: "m1".into(),
            message: Some(Payload::V16(p16::Payload::StartTransaction(
                p16::StartTransactionRequest {
                    connector_id: 1,
                    id_tag: id_tag.into(),
                    meter_start: 1000,
                    reservation_id: None,
                    timestamp: Utc::now(),
                },
            ))),
        }
    }

    fn result(sink: &ResultSink) -> serde_json::Value {
        match sink.take() {
            Some(CallOutcome::Result(value)) => value,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn accepted_start_returns_nonzero_transaction_id() {
        let (processor, _) = fixture().await;
        let sink = ResultSink::new();
        processor.process(&envelope("TAG-1"), &sink).await.unwrap();

        let value = result(&sink);
        assert_eq!(value["idTagInfo"]["status"], "Accepted");
        assert!(value["transactionId"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn invalid_tag_returns_zero_transaction_id() {
        let (processor, _) = fixture().await;
        let sink = ResultSink::new();
        processor.process(&envelope("NOBODY"), &sink).await.unwrap();

        let value = result(&sink);
        assert_eq!(value["idTagInfo"]["status"], "Invalid");
        assert_eq!(value["transactionId"], 0);
    }

    #[tokio::test]
    async fn concurrent_conflict_echoes_existing_transaction_id() {
        let (processor, _) = fixture().await;
        let sink = ResultSink::new();
        processor.process(&envelope("TAG-1"), &sink).await.unwrap();
        let first = result(&sink)["transactionId"].as_i64().unwrap();

        let sink = ResultSink::new();
        processor.process(&envelope("TAG-1"), &sink).await.unwrap();
        let value = result(&sink);
        assert_eq!(value["idTagInfo"]["status"], "ConcurrentTx");
        assert_eq!(value["transactionId"].as_i64().unwrap(), first);
    }

    #[tokio::test]
    async fn unregistered_charge_point_is_refused() {
        let (processor, _) = fixture().await;
        let mut env = envelope("TAG-1");
        env.origin = ChargePointIdentity::new("GHOST", None);
        let sink = ResultSink::new();
        processor.process(&env, &sink).await.unwrap();

        let value = result(&sink);
        assert_eq!(value["idTagInfo"]["status"], "Invalid");
        assert_eq!(value["transactionId"], 0);
    }
}
