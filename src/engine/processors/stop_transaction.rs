//! StopTransaction processor
//!
//! Ends the active session. An unknown transaction id is answered, not
//! failed — charge points retry stops after reboots and the protocol
//! tolerates a stop for a transaction the central system no longer knows.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::authorization::AuthorizationService;
use crate::domain::action::v16;
use crate::domain::{ActionKey, DomainError};
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::engine::sessions::{ChargeSessionManager, SessionError};
use crate::protocol::{v16 as p16, Envelope, OcppError, Payload, ResultSink};
use crate::store::Store;

pub struct StopTransactionProcessor {
    sessions: Arc<ChargeSessionManager>,
    authorization: Arc<dyn AuthorizationService>,
    store: Arc<dyn Store>,
}

impl StopTransactionProcessor {
    pub fn new(
        sessions: Arc<ChargeSessionManager>,
        authorization: Arc<dyn AuthorizationService>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            sessions,
            authorization,
            store,
        }
    }

    async fn id_tag_info(
        &self,
        envelope: &Envelope,
        id_tag: Option<&str>,
    ) -> Result<Option<p16::IdTagInfo>, ProcessError> {
        match id_tag {
            Some(tag) => {
                let verdict = self.authorization.authorize(tag, &envelope.origin).await?;
                Ok(Some(p16::IdTagInfo::of(verdict.status)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ActionProcessor for StopTransactionProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![v16::CentralAction::StopTransaction.key()]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        let Some(Payload::V16(p16::Payload::StopTransaction(request))) = &envelope.message else {
            sink.deliver_error(OcppError::formation_violation(
                "StopTransaction requires a payload",
            ));
            return Ok(());
        };

        let id_tag_info = self
            .id_tag_info(envelope, request.id_tag.as_deref())
            .await?;

        let Some(charge_point) = super::resolve_charge_point(&self.store, &envelope.origin).await?
        else {
            warn!(
                origin = %envelope.origin,
                "StopTransaction from unregistered charge point"
            );
            sink.deliver_result(&p16::StopTransactionResponse { id_tag_info });
            return Ok(());
        };

        let transaction_id = request.transaction_id.to_string();
        let session_id = match self
            .sessions
            .end_charging_session(
                charge_point.id,
                &transaction_id,
                request.meter_stop,
                Some(request.timestamp),
                request.reason,
            )
            .await
        {
            Ok(session) => {
                info!(
                    origin = %envelope.origin,
                    transaction_id = transaction_id.as_str(),
                    energy = ?session.energy_delivered(),
                    "Transaction stopped"
                );
                Some(session.id)
            }
            Err(SessionError::Domain(DomainError::SessionNotFound { .. })) => {
                warn!(
                    origin = %envelope.origin,
                    transaction_id = transaction_id.as_str(),
                    "Stop for unknown transaction"
                );
                None
            }
            Err(e) => return Err(e.into()),
        };

        // Trailing transactionData readings ride along with the stop.
        if let Some(batches) = &request.transaction_data {
            let readings = super::meter_values::flatten_meter_values(session_id, batches);
            if !readings.is_empty() {
                self.sessions.add_charging_session_readings(readings).await?;
            }
        }

        sink.deliver_result(&p16::StopTransactionResponse { id_tag_info });
        Ok(())
    }
}
