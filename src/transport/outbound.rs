//! Outbound call tracking
//!
//! Sends central-system-initiated calls to charge points and correlates
//! the replies: each call gets a fresh correlation id and a pending-map
//! entry; the dispatcher routes inbound CallResult/CallError frames back
//! here via [`ReplyRouter`]. Replies are decoded through the version
//! decoder with `for_result = true`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::registry::SharedConnectionRegistry;
use crate::domain::action::v16 as a16;
use crate::domain::{
    ActionKey, ChargePointIdentity, ChargingProfile, ConfigurationKey, MessageDirection,
    OcppVersion,
};
use crate::engine::ReplyRouter;
use crate::protocol::{v16 as p16, Frame, OcppError, Payload, PayloadDecoder};

const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 30;

/// Failure modes of an outbound call.
#[derive(Debug, thiserror::Error)]
pub enum CallFailure {
    #[error("Charge point not connected: {0}")]
    NotConnected(String),

    #[error("Response timeout")]
    Timeout,

    #[error("Reply channel closed")]
    ChannelClosed,

    #[error("CallError {code}: {description}")]
    CallError { code: String, description: String },

    #[error("Value violates the key's declared type: {0}")]
    InvalidValue(String),

    #[error("Unexpected reply shape")]
    UnexpectedReply,

    #[error(transparent)]
    Decode(#[from] OcppError),

    #[error("{0}")]
    Unsupported(String),
}

struct PendingCall {
    action: ActionKey,
    reply: oneshot::Sender<Result<Value, CallFailure>>,
}

/// Tracker for calls the central system sends to charge points.
pub struct OutboundCallTracker {
    connections: SharedConnectionRegistry,
    decoders: HashMap<OcppVersion, Arc<dyn PayloadDecoder>>,
    pending: DashMap<(ChargePointIdentity, String), PendingCall>,
    counter: AtomicU64,
    /// Last profile accepted per connector; unchanged resends are elided.
    last_profiles: DashMap<(ChargePointIdentity, u32), ChargingProfile>,
    response_timeout: Duration,
}

impl OutboundCallTracker {
    pub fn new(
        connections: SharedConnectionRegistry,
        decoders: Vec<Arc<dyn PayloadDecoder>>,
    ) -> Self {
        Self {
            connections,
            decoders: decoders.into_iter().map(|d| (d.version(), d)).collect(),
            pending: DashMap::new(),
            counter: AtomicU64::new(1),
            last_profiles: DashMap::new(),
            response_timeout: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    fn next_correlation_id(&self) -> String {
        format!("cs-{}", self.counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Send one call and await its decoded reply.
    pub async fn send_call(
        &self,
        target: &ChargePointIdentity,
        action: ActionKey,
        payload: Value,
    ) -> Result<Option<Payload>, CallFailure> {
        if action.direction != MessageDirection::ChargePointBound {
            return Err(CallFailure::Unsupported(format!(
                "{} is not charge-point-bound",
                action
            )));
        }
        let version = self
            .connections
            .version_of(target)
            .ok_or_else(|| CallFailure::NotConnected(target.to_string()))?;
        if version != action.version {
            return Err(CallFailure::Unsupported(format!(
                "{} speaks {}, action is {}",
                target, version, action.version
            )));
        }

        let correlation_id = self.next_correlation_id();
        let frame = Frame::Call {
            correlation_id: correlation_id.clone(),
            action: action.name.to_string(),
            payload,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let key = (target.clone(), correlation_id.clone());
        self.pending.insert(
            key.clone(),
            PendingCall {
                action,
                reply: reply_tx,
            },
        );

        info!(
            target = %target,
            action = %action,
            correlation_id = correlation_id.as_str(),
            "Sending call"
        );
        if let Err(e) = self.connections.send_to(target, frame.serialize()) {
            self.pending.remove(&key);
            return Err(CallFailure::NotConnected(e.to_string()));
        }

        let raw = match timeout(self.response_timeout, reply_rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => {
                self.pending.remove(&key);
                return Err(CallFailure::ChannelClosed);
            }
            Err(_) => {
                self.pending.remove(&key);
                warn!(
                    target = %target,
                    action = %action,
                    correlation_id = correlation_id.as_str(),
                    "Call timed out"
                );
                return Err(CallFailure::Timeout);
            }
        };

        let decoder = self
            .decoders
            .get(&action.version)
            .ok_or_else(|| CallFailure::Unsupported(format!("No decoder for {}", action.version)))?;
        Ok(decoder.decode(&action, true, &raw)?)
    }

    /// Drop pending calls for a disconnected charge point.
    pub fn cleanup(&self, target: &ChargePointIdentity) {
        self.pending.retain(|(identity, _), _| identity != target);
    }

    // ── Typed helpers ──────────────────────────────────────────

    pub async fn remote_start_transaction(
        &self,
        target: &ChargePointIdentity,
        id_tag: &str,
        connector_id: Option<u32>,
    ) -> Result<p16::AcceptanceStatus, CallFailure> {
        let payload = serde_json::to_value(p16::RemoteStartTransactionRequest {
            connector_id,
            id_tag: id_tag.to_string(),
            charging_profile: None,
        })
        .expect("request serialization cannot fail");
        let reply = self
            .send_call(target, a16::ChargePointAction::RemoteStartTransaction.key(), payload)
            .await?;
        match reply {
            Some(Payload::V16(p16::Payload::RemoteStartTransactionResult(response))) => {
                Ok(response.status)
            }
            _ => Err(CallFailure::UnexpectedReply),
        }
    }

    pub async fn remote_stop_transaction(
        &self,
        target: &ChargePointIdentity,
        transaction_id: i64,
    ) -> Result<p16::AcceptanceStatus, CallFailure> {
        let payload = serde_json::to_value(p16::RemoteStopTransactionRequest { transaction_id })
            .expect("request serialization cannot fail");
        let reply = self
            .send_call(target, a16::ChargePointAction::RemoteStopTransaction.key(), payload)
            .await?;
        match reply {
            Some(Payload::V16(p16::Payload::RemoteStopTransactionResult(response))) => {
                Ok(response.status)
            }
            _ => Err(CallFailure::UnexpectedReply),
        }
    }

    /// ChangeConfiguration with the value checked against the key's
    /// declared type before anything goes on the wire.
    pub async fn change_configuration(
        &self,
        target: &ChargePointIdentity,
        key: ConfigurationKey,
        value: &str,
    ) -> Result<p16::ConfigurationStatus, CallFailure> {
        if !key.accepts_value(value) {
            return Err(CallFailure::InvalidValue(format!(
                "{}={:?} (expected {:?})",
                key.name(),
                value,
                key.key_type()
            )));
        }
        let payload = serde_json::to_value(p16::ChangeConfigurationRequest {
            key: key.name().to_string(),
            value: value.to_string(),
        })
        .expect("request serialization cannot fail");
        let reply = self
            .send_call(target, a16::ChargePointAction::ChangeConfiguration.key(), payload)
            .await?;
        match reply {
            Some(Payload::V16(p16::Payload::ChangeConfigurationResult(response))) => {
                Ok(response.status)
            }
            _ => Err(CallFailure::UnexpectedReply),
        }
    }

    pub async fn get_configuration(
        &self,
        target: &ChargePointIdentity,
        keys: Option<Vec<ConfigurationKey>>,
    ) -> Result<p16::GetConfigurationResponse, CallFailure> {
        let payload = serde_json::to_value(p16::GetConfigurationRequest {
            key: keys.map(|keys| keys.iter().map(|k| k.name().to_string()).collect()),
        })
        .expect("request serialization cannot fail");
        let reply = self
            .send_call(target, a16::ChargePointAction::GetConfiguration.key(), payload)
            .await?;
        match reply {
            Some(Payload::V16(p16::Payload::GetConfigurationResult(response))) => Ok(response),
            // An empty reply object is a valid "nothing configured".
            None => Ok(p16::GetConfigurationResponse {
                configuration_key: None,
                unknown_key: None,
            }),
            _ => Err(CallFailure::UnexpectedReply),
        }
    }

    /// SetChargingProfile; structurally-unchanged resends are elided and
    /// reported as accepted.
    pub async fn set_charging_profile(
        &self,
        target: &ChargePointIdentity,
        connector_id: u32,
        profile: p16::CsChargingProfiles,
    ) -> Result<p16::ChargingProfileStatus, CallFailure> {
        let domain_profile = profile.to_profile();
        let cache_key = (target.clone(), connector_id);
        if let Some(last) = self.last_profiles.get(&cache_key) {
            if last.is_same_as(&domain_profile) {
                debug!(
                    target = %target,
                    connector_id,
                    "Charging profile unchanged; skipping resend"
                );
                return Ok(p16::ChargingProfileStatus::Accepted);
            }
        }

        let payload = serde_json::to_value(p16::SetChargingProfileRequest {
            connector_id,
            cs_charging_profiles: profile,
        })
        .expect("request serialization cannot fail");
        let reply = self
            .send_call(target, a16::ChargePointAction::SetChargingProfile.key(), payload)
            .await?;
        match reply {
            Some(Payload::V16(p16::Payload::SetChargingProfileResult(response))) => {
                if response.status == p16::ChargingProfileStatus::Accepted {
                    self.last_profiles.insert(cache_key, domain_profile);
                }
                Ok(response.status)
            }
            _ => Err(CallFailure::UnexpectedReply),
        }
    }
}

impl ReplyRouter for OutboundCallTracker {
    fn on_call_result(&self, origin: &ChargePointIdentity, correlation_id: &str, payload: Value) {
        let key = (origin.clone(), correlation_id.to_string());
        if let Some((_, pending)) = self.pending.remove(&key) {
            debug!(
                origin = %origin,
                action = %pending.action,
                correlation_id,
                "Call answered"
            );
            let _ = pending.reply.send(Ok(payload));
        } else {
            warn!(origin = %origin, correlation_id, "Reply for unknown call");
        }
    }

    fn on_call_error(
        &self,
        origin: &ChargePointIdentity,
        correlation_id: &str,
        code: &str,
        description: &str,
    ) {
        let key = (origin.clone(), correlation_id.to_string());
        if let Some((_, pending)) = self.pending.remove(&key) {
            warn!(
                origin = %origin,
                action = %pending.action,
                correlation_id,
                code,
                "Call failed"
            );
            let _ = pending.reply.send(Err(CallFailure::CallError {
                code: code.to_string(),
                description: description.to_string(),
            }));
        }
    }
}
