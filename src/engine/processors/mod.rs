//! Standard action processors

pub mod authorize;
pub mod boot_notification;
pub mod data_transfer;
pub mod heartbeat;
pub mod meter_values;
pub mod notifications;
pub mod start_transaction;
pub mod status_notification;
pub mod stop_transaction;
pub mod transaction_event;

pub use authorize::AuthorizeProcessor;
pub use boot_notification::BootNotificationProcessor;
pub use data_transfer::DataTransferProcessor;
pub use heartbeat::HeartbeatProcessor;
pub use meter_values::MeterValuesProcessor;
pub use notifications::StationNotificationProcessor;
pub use start_transaction::StartTransactionProcessor;
pub use status_notification::StatusNotificationProcessor;
pub use stop_transaction::StopTransactionProcessor;
pub use transaction_event::TransactionEventProcessor;

use std::sync::Arc;

use crate::domain::{ChargePoint, ChargePointIdentity, DomainResult};
use crate::store::Store;

/// Resolve the registered charge point for an envelope origin.
pub(crate) async fn resolve_charge_point(
    store: &Arc<dyn Store>,
    identity: &ChargePointIdentity,
) -> DomainResult<Option<ChargePoint>> {
    store.charge_point_by_identity(identity).await
}
