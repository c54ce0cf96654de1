//! DataTransfer processor
//!
//! No vendor extensions are wired in; every transfer is answered with
//! `UnknownVendorId`.

use async_trait::async_trait;
use tracing::info;

use crate::domain::action::v16;
use crate::domain::ActionKey;
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::protocol::{v16 as p16, Envelope, OcppError, Payload, ResultSink};

pub struct DataTransferProcessor;

#[async_trait]
impl ActionProcessor for DataTransferProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![v16::CentralAction::DataTransfer.key()]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        let Some(Payload::V16(p16::Payload::DataTransfer(request))) = &envelope.message else {
            sink.deliver_error(OcppError::formation_violation(
                "DataTransfer requires a payload",
            ));
            return Ok(());
        };

        info!(
            origin = %envelope.origin,
            vendor_id = request.vendor_id.as_str(),
            message_id = ?request.message_id,
            "Data transfer"
        );
        sink.deliver_result(&p16::DataTransferResponse {
            status: p16::DataTransferStatus::UnknownVendorId,
            data: None,
        });
        Ok(())
    }
}
