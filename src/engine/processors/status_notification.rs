//! StatusNotification processor

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::action::{v16, v201};
use crate::domain::ActionKey;
use crate::engine::connectors::{ConnectorStatusTracker, StatusReport};
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::protocol::{v16 as p16, v201 as p201, Envelope, OcppError, Payload, ResultSink};
use crate::store::Store;

pub struct StatusNotificationProcessor {
    tracker: Arc<ConnectorStatusTracker>,
    store: Arc<dyn Store>,
}

impl StatusNotificationProcessor {
    pub fn new(tracker: Arc<ConnectorStatusTracker>, store: Arc<dyn Store>) -> Self {
        Self { tracker, store }
    }
}

#[async_trait]
impl ActionProcessor for StatusNotificationProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![
            v16::CentralAction::StatusNotification.key(),
            v201::CentralAction::StatusNotification.key(),
        ]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        let Some(charge_point) = super::resolve_charge_point(&self.store, &envelope.origin).await?
        else {
            warn!(
                origin = %envelope.origin,
                "Status notification from unregistered charge point"
            );
            sink.deliver_result(&p16::StatusNotificationResponse {});
            return Ok(());
        };

        match &envelope.message {
            Some(Payload::V16(p16::Payload::StatusNotification(request))) => {
                info!(
                    origin = %envelope.origin,
                    connector_id = request.connector_id,
                    status = ?request.status,
                    error_code = ?request.error_code,
                    "Status notification"
                );
                self.tracker
                    .record_status(
                        charge_point.id,
                        request.connector_id,
                        StatusReport {
                            status: request.status,
                            error_code: request.error_code,
                            timestamp: request.timestamp,
                            info: request.info.clone(),
                            vendor_id: request.vendor_id.clone(),
                            vendor_error_code: request.vendor_error_code.clone(),
                        },
                    )
                    .await?;
                sink.deliver_result(&p16::StatusNotificationResponse {});
            }
            Some(Payload::V201(p201::Payload::StatusNotification(request))) => {
                info!(
                    origin = %envelope.origin,
                    evse_id = request.evse_id,
                    connector_id = request.connector_id,
                    status = ?request.connector_status,
                    "Status notification"
                );
                let mut report = StatusReport::of(request.connector_status.to_domain());
                report.timestamp = Some(request.timestamp);
                self.tracker
                    .record_status(charge_point.id, request.connector_id, report)
                    .await?;
                sink.deliver_result(&p201::StatusNotificationResponse {});
            }
            _ => {
                sink.deliver_error(OcppError::formation_violation(
                    "StatusNotification requires a payload",
                ));
            }
        }
        Ok(())
    }
}
