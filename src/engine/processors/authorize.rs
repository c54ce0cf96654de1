//! Authorize processor

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::authorization::AuthorizationService;
use crate::domain::action::{v16, v201};
use crate::domain::ActionKey;
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::protocol::{v16 as p16, v201 as p201, Envelope, OcppError, Payload, ResultSink};

pub struct AuthorizeProcessor {
    authorization: Arc<dyn AuthorizationService>,
}

impl AuthorizeProcessor {
    pub fn new(authorization: Arc<dyn AuthorizationService>) -> Self {
        Self { authorization }
    }
}

#[async_trait]
impl ActionProcessor for AuthorizeProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![
            v16::CentralAction::Authorize.key(),
            v201::CentralAction::Authorize.key(),
        ]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        match &envelope.message {
            Some(Payload::V16(p16::Payload::Authorize(request))) => {
                let verdict = self
                    .authorization
                    .authorize(&request.id_tag, &envelope.origin)
                    .await?;
                info!(
                    origin = %envelope.origin,
                    id_tag = request.id_tag.as_str(),
                    status = ?verdict.status,
                    "Authorize"
                );
                sink.deliver_result(&p16::AuthorizeResponse {
                    id_tag_info: p16::IdTagInfo::of(verdict.status),
                });
            }
            Some(Payload::V201(p201::Payload::Authorize(request))) => {
                let verdict = self
                    .authorization
                    .authorize(&request.id_token.id_token, &envelope.origin)
                    .await?;
                info!(
                    origin = %envelope.origin,
                    id_token = request.id_token.id_token.as_str(),
                    status = ?verdict.status,
                    "Authorize"
                );
                sink.deliver_result(&p201::AuthorizeResponse {
                    id_token_info: p201::IdTokenInfo {
                        status: verdict.status.into(),
                    },
                });
            }
            _ => {
                sink.deliver_error(OcppError::formation_violation(
                    "Authorize requires a payload",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::StaticAuthorizationService;
    use crate::domain::ChargePointIdentity;
    use crate::protocol::CallOutcome;

    fn envelope(id_tag: &str) -> Envelope {
        Envelope {
            origin: ChargePointIdentity::new("CP001", None),
            action: v16::CentralAction::Authorize.key(),
            correlation_id: "m1".into(),
            message: Some(Payload::V16(p16::Payload::Authorize(p16::AuthorizeRequest {
                id_tag: id_tag.into(),
            }))),
        }
    }

    #[tokio::test]
    async fn known_tag_is_accepted() {
        let processor = AuthorizeProcessor::new(Arc::new(
            StaticAuthorizationService::with_accepted(["TAG-1"]),
        ));
        let sink = ResultSink::new();
        processor.process(&envelope("TAG-1"), &sink).await.unwrap();
        match sink.take() {
            Some(CallOutcome::Result(value)) => {
                assert_eq!(value["idTagInfo"]["status"], "Accepted");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_tag_is_invalid() {
        let processor =
            AuthorizeProcessor::new(Arc::new(StaticAuthorizationService::new()));
        let sink = ResultSink::new();
        processor.process(&envelope("NOBODY"), &sink).await.unwrap();
        match sink.take() {
            Some(CallOutcome::Result(value)) => {
                assert_eq!(value["idTagInfo"]["status"], "Invalid");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
