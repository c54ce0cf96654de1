//! BootNotification processor
//!
//! Registers the charge point on first boot and refreshes its info on
//! every later one; answers with the registration status, current time
//! and heartbeat interval.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::domain::action::{v16, v201};
use crate::domain::{ActionKey, ChargePoint, ChargePointInfo};
use crate::engine::processor::{ActionProcessor, ProcessError};
use crate::protocol::{v16 as p16, v201 as p201, Envelope, OcppError, Payload, ResultSink};
use crate::store::Store;

pub struct BootNotificationProcessor {
    store: Arc<dyn Store>,
    heartbeat_interval_secs: i32,
}

impl BootNotificationProcessor {
    pub fn new(store: Arc<dyn Store>, heartbeat_interval_secs: i32) -> Self {
        Self {
            store,
            heartbeat_interval_secs,
        }
    }

    async fn register(&self, envelope: &Envelope, info: ChargePointInfo) -> Result<(), ProcessError> {
        match self.store.charge_point_by_identity(&envelope.origin).await? {
            Some(mut existing) => {
                existing.info = info;
                self.store.update_charge_point(existing).await?;
                info!(origin = %envelope.origin, "Charge point re-registered");
            }
            None => {
                let id = self.store.next_charge_point_id().await;
                let charge_point = ChargePoint::new(id, envelope.origin.clone(), info);
                self.store.save_charge_point(charge_point).await?;
                info!(origin = %envelope.origin, id, "Charge point registered");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ActionProcessor for BootNotificationProcessor {
    fn actions(&self) -> Vec<ActionKey> {
        vec![
            v16::CentralAction::BootNotification.key(),
            v201::CentralAction::BootNotification.key(),
        ]
    }

    async fn process(&self, envelope: &Envelope, sink: &ResultSink) -> Result<(), ProcessError> {
        match &envelope.message {
            Some(Payload::V16(p16::Payload::BootNotification(request))) => {
                self.register(
                    envelope,
                    ChargePointInfo {
                        vendor: request.charge_point_vendor.clone(),
                        model: request.charge_point_model.clone(),
                        serial_number: request.charge_point_serial_number.clone(),
                        firmware_version: request.firmware_version.clone(),
                    },
                )
                .await?;
                sink.deliver_result(&p16::BootNotificationResponse {
                    status: p16::RegistrationStatus::Accepted,
                    current_time: Utc::now(),
                    interval: self.heartbeat_interval_secs,
                });
            }
            Some(Payload::V201(p201::Payload::BootNotification(request))) => {
                self.register(
                    envelope,
                    ChargePointInfo {
                        vendor: request.charging_station.vendor_name.clone(),
                        model: request.charging_station.model.clone(),
                        serial_number: request.charging_station.serial_number.clone(),
                        firmware_version: request.charging_station.firmware_version.clone(),
                    },
                )
                .await?;
                sink.deliver_result(&p201::BootNotificationResponse {
                    current_time: Utc::now(),
                    interval: self.heartbeat_interval_secs,
                    status: p201::RegistrationStatusType::Accepted,
                });
            }
            _ => {
                sink.deliver_error(OcppError::formation_violation(
                    "BootNotification requires a payload",
                ));
            }
        }
        Ok(())
    }
}
