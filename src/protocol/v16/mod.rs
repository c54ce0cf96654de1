//! OCPP 1.6 payloads and decoder

pub mod decoder;
pub mod payloads;

pub use decoder::V16Decoder;
pub use payloads::*;

/// A decoded OCPP 1.6 payload.
///
/// Request variants cover central-bound calls; `*Result` variants cover
/// the call results of charge-point-bound calls the central system sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    BootNotification(BootNotificationRequest),
    Authorize(AuthorizeRequest),
    StartTransaction(StartTransactionRequest),
    StopTransaction(StopTransactionRequest),
    MeterValues(MeterValuesRequest),
    StatusNotification(StatusNotificationRequest),
    DiagnosticsStatusNotification(DiagnosticsStatusNotificationRequest),
    FirmwareStatusNotification(FirmwareStatusNotificationRequest),
    DataTransfer(DataTransferRequest),

    RemoteStartTransactionResult(RemoteStartTransactionResponse),
    RemoteStopTransactionResult(RemoteStopTransactionResponse),
    ResetResult(ResetResponse),
    UnlockConnectorResult(UnlockConnectorResponse),
    GetConfigurationResult(GetConfigurationResponse),
    ChangeConfigurationResult(ChangeConfigurationResponse),
    ClearCacheResult(ClearCacheResponse),
    ChangeAvailabilityResult(ChangeAvailabilityResponse),
    TriggerMessageResult(TriggerMessageResponse),
    SetChargingProfileResult(SetChargingProfileResponse),
}
