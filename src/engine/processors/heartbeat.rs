//! Heartbeat processor
//!
//! Stateless; answers with the central system's current time. The
//! request payload is empty in both protocol versions.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::domain::action::{v16, v201};
use crate::domain::{ActionKey, OcppVersion};
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::protocol::{v16 as p16, v201 as p201, Envelope, ResultSink};

pub struct HeartbeatProcessor;

#[async_trait]
impl ActionProcessor for HeartbeatProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![
            v16::CentralAction::Heartbeat.key(),
            v201::CentralAction::Heartbeat.key(),
        ]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        debug!(origin = %envelope.origin, "Heartbeat");
        match envelope.action.version {
            OcppVersion::V16 => {
                sink.deliver_result(&p16::HeartbeatResponse {
                    current_time: Utc::now(),
                });
            }
            OcppVersion::V201 => {
                sink.deliver_result(&p201::HeartbeatResponse {
                    current_time: Utc::now(),
                });
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
    async fn answers_with_current_time() {
        let envelope = Envelope {
            origin: ChargePointIdentity::new("CP001", None),
            action: v16::CentralAction::Heartbeat.key(),
            correlation_id: "m1".into(),
            message: None,
        };
        let sink = ResultSink::new();
        HeartbeatProcessor.process(&envelope, &sink).await.unwrap();
        match sink.take() {
            Some(CallOutcome::Result(value)) => {
                assert!(value["currentTime"].is_string());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
