//! Diagnostics and firmware status notification processors
//!
//! Stateless: the reports are logged and acknowledged.

use async_trait::async_trait;
use tracing::info;

use crate::domain::action::v16;
use crate::domain::ActionKey;
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::protocol::{v16 as p16, Envelope, Payload, ResultSink};

pub struct StationNotificationProcessor;

#[async_trait]
impl ActionProcessor for StationNotificationProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![
            v16::CentralAction::DiagnosticsStatusNotification.key(),
            v16::CentralAction::FirmwareStatusNotification.key(),
        ]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        match &envelope.message {
            Some(Payload::V16(p16::Payload::DiagnosticsStatusNotification(request))) => {
                info!(
                    origin = %envelope.origin,
                    status = ?request.status,
                    "Diagnostics status"
                );
                sink.deliver_result(&p16::DiagnosticsStatusNotificationResponse {});
            }
            Some(Payload::V16(p16::Payload::FirmwareStatusNotification(request))) => {
                info!(
                    origin = %envelope.origin,
                    status = ?request.status,
                    "Firmware status"
                );
                sink.deliver_result(&p16::FirmwareStatusNotificationResponse {});
            }
            _ => {
                // Both notifications tolerate an absent payload.
                info!(origin = %envelope.origin, action = %envelope.action, "Status report");
                sink.deliver_result(&serde_json::json!({}));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChargePointIdentity;
    use crate::protocol::CallOutcome;

    #[tokio::test]
    async fn diagnostics_report_is_acknowledged() {
        let envelope = Envelope {
            origin: ChargePointIdentity::new("CP001", None),
            action: v16::CentralAction::DiagnosticsStatusNotification.key(),
            correlation_id: "m1".into(),
            message: Some(Payload::V16(p16::Payload::DiagnosticsStatusNotification(
                p16::DiagnosticsStatusNotificationRequest {
                    status: p16::DiagnosticsStatus::Uploaded,
                },
            ))),
        };
        let sink = ResultSink::new();
        StationNotificationProcessor
            .process(&envelope, &sink)
            .await
            .unwrap();
        assert!(matches!(sink.take(), Some(CallOutcome::Result(_))));
    }
}
