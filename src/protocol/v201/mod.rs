//! OCPP 2.0.1 payloads and decoder

pub mod decoder;
pub mod payloads;
mod schema;

pub use decoder::V201Decoder;
pub use payloads::*;

/// A decoded OCPP 2.0.1 payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    BootNotification(BootNotificationRequest),
    Authorize(AuthorizeRequest),
    StatusNotification(StatusNotificationRequest),
    MeterValues(MeterValuesRequest),
    TransactionEvent(TransactionEventRequest),

    RequestStartTransactionResult(RequestStartTransactionResponse),
    RequestStopTransactionResult(RequestStopTransactionResponse),
    ResetResult(ResetResponse),
    GetVariablesResult(GetVariablesResponse),
    SetVariablesResult(SetVariablesResponse),
}
