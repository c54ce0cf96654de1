//! Action dispatcher
//!
//! Entry point for raw inbound frames. The transport hands a frame off
//! via [`Dispatcher::submit`] and returns immediately; a per-charge-point
//! worker task decodes and processes frames in receipt order and writes
//! the encoded response back through the frame sink, so responses for one
//! connection are never interleaved. Different charge points run on
//! different workers and share nothing but the registry and managers.
//!
//! Error synthesis at this boundary: unknown action → `NotImplemented`,
//! processor authorization failure → `SecurityError` (fixed description),
//! any other processor failure or panic → `InternalError`. A failure in
//! one worker never takes down dispatch for other charge points.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::processor::ProcessError;
use super::registry::ProcessorRegistry;
use crate::domain::{self, ChargePointIdentity, DomainResult, MessageDirection, OcppVersion};
use crate::protocol::{CallOutcome, Envelope, Frame, OcppError, PayloadDecoder, ResultSink};

/// Outbound write path back to one connection.
///
/// Implemented by the transport's connection registry; test doubles
/// capture frames instead.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, origin: &ChargePointIdentity, frame: String) -> DomainResult<()>;
}

/// Receiver for inbound call results and call errors, i.e. replies to
/// calls the central system sent.
pub trait ReplyRouter: Send + Sync {
    fn on_call_result(&self, origin: &ChargePointIdentity, correlation_id: &str, payload: Value);
    fn on_call_error(
        &self,
        origin: &ChargePointIdentity,
        correlation_id: &str,
        code: &str,
        description: &str,
    );
}

struct Job {
    version: OcppVersion,
    raw: String,
}

/// The shared dispatcher.
pub struct Dispatcher {
    registry: Arc<ProcessorRegistry>,
    decoders: HashMap<OcppVersion, Arc<dyn PayloadDecoder>>,
    sink: Arc<dyn FrameSink>,
    replies: Option<Arc<dyn ReplyRouter>>,
    workers: dashmap::DashMap<ChargePointIdentity, mpsc::UnboundedSender<Job>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ProcessorRegistry>,
        decoders: Vec<Arc<dyn PayloadDecoder>>,
        sink: Arc<dyn FrameSink>,
        replies: Option<Arc<dyn ReplyRouter>>,
    ) -> Self {
        Self {
            registry,
            decoders: decoders.into_iter().map(|d| (d.version(), d)).collect(),
            sink,
            replies,
            workers: dashmap::DashMap::new(),
        }
    }

    /// Hand off one raw frame. Returns immediately; processing happens on
    /// the charge point's worker task in receipt order.
    pub fn submit(self: &Arc<Self>, origin: &ChargePointIdentity, version: OcppVersion, raw: String) {
        let sender = self
            .workers
            .entry(origin.clone())
            .or_insert_with(|| self.spawn_worker(origin.clone()))
            .clone();
        if let Err(unsent) = sender.send(Job { version, raw }) {
            // Worker died; replace it and retry once with the same job.
            warn!(origin = %origin, "Dispatch worker was gone; respawning");
            let sender = self.spawn_worker(origin.clone());
            let _ = sender.send(unsent.0);
            self.workers.insert(origin.clone(), sender);
        }
    }

    /// Drop the worker for a disconnected charge point.
    pub fn remove_worker(&self, origin: &ChargePointIdentity) {
        if self.workers.remove(origin).is_some() {
            debug!(origin = %origin, "Removed dispatch worker");
        }
    }

    fn spawn_worker(self: &Arc<Self>, origin: ChargePointIdentity) -> mpsc::UnboundedSender<Job> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let dispatcher = self.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                dispatcher.process_raw(&origin, job.version, &job.raw).await;
            }
            debug!(origin = %origin, "Dispatch worker stopped");
        });
        tx
    }

    async fn process_raw(&self, origin: &ChargePointIdentity, version: OcppVersion, raw: &str) {
        match Frame::parse(raw) {
            Ok(Frame::Call {
                correlation_id,
                action,
                payload,
            }) => {
                let reply = self
                    .dispatch_call(origin, version, &correlation_id, &action, payload)
                    .await;
                if let Some(frame) = reply {
                    if let Err(e) = self.sink.send_frame(origin, frame.serialize()) {
                        error!(origin = %origin, error = %e, "Failed to send response");
                    }
                }
            }
            Ok(Frame::CallResult {
                correlation_id,
                payload,
            }) => match &self.replies {
                Some(router) => router.on_call_result(origin, &correlation_id, payload),
                None => warn!(
                    origin = %origin,
                    correlation_id = correlation_id.as_str(),
                    "Unexpected CallResult"
                ),
            },
            Ok(Frame::CallError {
                correlation_id,
                code,
                description,
                ..
            }) => match &self.replies {
                Some(router) => router.on_call_error(origin, &correlation_id, &code, &description),
                None => warn!(
                    origin = %origin,
                    correlation_id = correlation_id.as_str(),
                    code = code.as_str(),
                    "Unexpected CallError"
                ),
            },
            Err(e) => {
                // No usable correlation id; nothing to answer.
                warn!(origin = %origin, error = %e, "Discarding unparseable frame");
            }
        }
    }

    /// Dispatch one inbound call and produce the response frame.
    ///
    /// Returns `None` when every processor ran without delivering an
    /// outcome — that is a processor bug, not a timeout case; the
    /// transport owns any timeout policy.
    async fn dispatch_call(
        &self,
        origin: &ChargePointIdentity,
        version: OcppVersion,
        correlation_id: &str,
        action_name: &str,
        payload: Value,
    ) -> Option<Frame> {
        let Some(action) = domain::resolve(version, MessageDirection::CentralBound, action_name)
        else {
            debug!(origin = %origin, action_name, "Unknown action");
            return Some(Frame::call_error(
                correlation_id,
                &OcppError::not_implemented(action_name),
            ));
        };

        let Some(decoder) = self.decoders.get(&version) else {
            return Some(Frame::call_error(
                correlation_id,
                &OcppError::not_supported(format!("No decoder for {}", version)),
            ));
        };

        let message = match decoder.decode(&action, false, &payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(origin = %origin, action = %action, error = %e, "Decode failed");
                return Some(Frame::call_error(correlation_id, &e));
            }
        };

        let processors = self.registry.processors_for(&action);
        if processors.is_empty() {
            return Some(Frame::call_error(
                correlation_id,
                &OcppError::not_implemented(action_name),
            ));
        }

        let envelope = Envelope {
            origin: origin.clone(),
            action,
            correlation_id: correlation_id.to_string(),
            message,
        };
        let sink = ResultSink::new();

        for processor in processors {
            let outcome = AssertUnwindSafe(processor.process(&envelope, &sink))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(ProcessError::Unauthorized(auth))) => {
                    warn!(
                        origin = %origin,
                        action = %envelope.action,
                        status = ?auth.status,
                        "Processor raised authorization failure"
                    );
                    sink.deliver_error(OcppError::security());
                }
                Ok(Err(ProcessError::Internal(message))) => {
                    error!(
                        origin = %origin,
                        action = %envelope.action,
                        error = message.as_str(),
                        "Processor failed"
                    );
                    sink.deliver_error(OcppError::internal(message));
                }
                Err(panic) => {
                    let message = panic_message(panic);
                    error!(
                        origin = %origin,
                        action = %envelope.action,
                        error = message.as_str(),
                        "Processor panicked"
                    );
                    sink.deliver_error(OcppError::internal(message));
                }
            }
        }

        match sink.take() {
            Some(CallOutcome::Result(value)) => Some(Frame::call_result(correlation_id, value)),
            Some(CallOutcome::Error(e)) => Some(Frame::call_error(correlation_id, &e)),
            None => {
                warn!(
                    origin = %origin,
                    action = %envelope.action,
                    "No processor delivered an outcome"
                );
                None
            }
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "processor panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::v16::CentralAction;
    use crate::domain::ActionKey;
    use crate::engine::processor::ActionProcessor;
    use crate::engine::sessions::AuthorizationError;
    use crate::authorization::AuthorizationStatus;
    use crate::protocol::v16::V16Decoder;
    use crate::protocol::ErrorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct CapturingSink {
        frames: Mutex<Vec<String>>,
        notify: tokio::sync::Notify,
    }

    impl CapturingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
                notify: tokio::sync::Notify::new(),
            })
        }

        async fn wait_for(&self, count: usize) -> Vec<String> {
            for _ in 0..200 {
                {
                    let frames = self.frames.lock().unwrap();
                    if frames.len() >= count {
                        return frames.clone();
                    }
                }
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                }
            }
            panic!("timed out waiting for {} frames", count);
        }
    }

    impl FrameSink for CapturingSink {
        fn send_frame(&self, _origin: &ChargePointIdentity, frame: String) -> DomainResult<()> {
            self.frames.lock().unwrap().push(frame);
            self.notify.notify_waiters();
            Ok(())
        }
    }

    enum Behavior {
        Deliver(&'static str),
        Observe,
        FailInternal,
        FailAuthorization,
        Panic,
        SlowDeliver(u64),
    }

    struct Scripted {
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ActionProcessor for Scripted {
        fn actions(&self) -> Vec<ActionKey> {
            vec![CentralAction::Heartbeat.key()]
        }

        async fn process(
            &self,
            _envelope: &Envelope,
            sink: &ResultSink,
        ) -> Result<(), ProcessError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Deliver(tag) => {
                    sink.deliver_result(&json!({ "tag": tag }));
                    Ok(())
                }
                Behavior::Observe => Ok(()),
                Behavior::FailInternal => Err(ProcessError::Internal("exploded".into())),
                Behavior::FailAuthorization => Err(ProcessError::Unauthorized(
                    AuthorizationError::new(AuthorizationStatus::Blocked),
                )),
                Behavior::Panic => panic!("deliberate panic"),
                Behavior::SlowDeliver(millis) => {
                    tokio::time::sleep(Duration::from_millis(*millis)).await;
                    sink.deliver_result(&json!({ "tag": "slow" }));
                    Ok(())
                }
            }
        }
    }

    fn dispatcher_with(
        processors: Vec<Scripted>,
        sink: Arc<CapturingSink>,
    ) -> Arc<Dispatcher> {
        let registry = Arc::new(ProcessorRegistry::new());
        for p in processors {
            registry.register(Arc::new(p));
        }
        Arc::new(Dispatcher::new(
            registry,
            vec![Arc::new(V16Decoder)],
            sink,
            None,
        ))
    }

    fn origin() -> ChargePointIdentity {
        ChargePointIdentity::new("CP001", None)
    }

    fn scripted(behavior: Behavior) -> (Scripted, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Scripted {
                behavior,
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn parse_error(frame: &str) -> (String, String, String) {
        match Frame::parse(frame).unwrap() {
            Frame::CallError {
                correlation_id,
                code,
                description,
                ..
            } => (correlation_id, code, description),
            other => panic!("expected CallError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_action_yields_not_implemented() {
        let sink = CapturingSink::new();
        let dispatcher = dispatcher_with(vec![], sink.clone());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m1","NoSuchAction",{}]"#.into());

        let frames = sink.wait_for(1).await;
        let (id, code, _) = parse_error(&frames[0]);
        assert_eq!(id, "m1");
        assert_eq!(code, ErrorKind::NotImplemented.code());
    }

    #[tokio::test]
    async fn unregistered_known_action_yields_not_implemented() {
        let sink = CapturingSink::new();
        let dispatcher = dispatcher_with(vec![], sink.clone());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m2","Heartbeat",{}]"#.into());

        let frames = sink.wait_for(1).await;
        let (_, code, _) = parse_error(&frames[0]);
        assert_eq!(code, ErrorKind::NotImplemented.code());
    }

    #[tokio::test]
    async fn decode_failure_yields_call_error() {
        let sink = CapturingSink::new();
        let (p, _) = scripted(Behavior::Deliver("x"));
        // Register a StartTransaction-capable processor via Heartbeat key
        // is irrelevant here; decode fails before dispatch.
        let dispatcher = dispatcher_with(vec![p], sink.clone());
        dispatcher.submit(
            &origin(),
            OcppVersion::V16,
            r#"[2,"m3","StartTransaction",{"connectorId":"one"}]"#.into(),
        );

        let frames = sink.wait_for(1).await;
        let (_, code, _) = parse_error(&frames[0]);
        assert_eq!(code, ErrorKind::FormationViolation.code());
    }

    #[tokio::test]
    async fn internal_failure_carries_message() {
        let sink = CapturingSink::new();
        let (p, _) = scripted(Behavior::FailInternal);
        let dispatcher = dispatcher_with(vec![p], sink.clone());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m4","Heartbeat",{}]"#.into());

        let frames = sink.wait_for(1).await;
        let (_, code, description) = parse_error(&frames[0]);
        assert_eq!(code, ErrorKind::InternalError.code());
        assert_eq!(description, "exploded");
    }

    #[tokio::test]
    async fn authorization_failure_has_fixed_description() {
        let sink = CapturingSink::new();
        let (p, _) = scripted(Behavior::FailAuthorization);
        let dispatcher = dispatcher_with(vec![p], sink.clone());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m5","Heartbeat",{}]"#.into());

        let frames = sink.wait_for(1).await;
        let (_, code, description) = parse_error(&frames[0]);
        assert_eq!(code, ErrorKind::SecurityError.code());
        assert_eq!(description, "Authorization error handling action.");
    }

    #[tokio::test]
    async fn panic_is_contained_as_internal_error() {
        let sink = CapturingSink::new();
        let (p, _) = scripted(Behavior::Panic);
        let dispatcher = dispatcher_with(vec![p], sink.clone());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m6","Heartbeat",{}]"#.into());

        let frames = sink.wait_for(1).await;
        let (_, code, description) = parse_error(&frames[0]);
        assert_eq!(code, ErrorKind::InternalError.code());
        assert_eq!(description, "deliberate panic");

        // The worker survives the panic.
        let (p2, _) = scripted(Behavior::Deliver("after"));
        dispatcher.registry.register(Arc::new(p2));
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m7","Heartbeat",{}]"#.into());
        let frames = sink.wait_for(2).await;
        assert!(frames[1].contains("m7"));
    }

    #[tokio::test]
    async fn first_processor_wins_but_all_run() {
        let sink = CapturingSink::new();
        let (winner, winner_calls) = scripted(Behavior::Deliver("winner"));
        let (observer, observer_calls) = scripted(Behavior::Deliver("loser"));
        let dispatcher = dispatcher_with(vec![winner, observer], sink.clone());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m8","Heartbeat",{}]"#.into());

        let frames = sink.wait_for(1).await;
        match Frame::parse(&frames[0]).unwrap() {
            Frame::CallResult { payload, .. } => assert_eq!(payload["tag"], "winner"),
            other => panic!("expected CallResult, got {:?}", other),
        }
        assert_eq!(winner_calls.load(Ordering::SeqCst), 1);
        assert_eq!(observer_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_after_delivery_is_discarded() {
        let sink = CapturingSink::new();
        let (winner, _) = scripted(Behavior::Deliver("winner"));
        let (failing, failing_calls) = scripted(Behavior::FailInternal);
        let dispatcher = dispatcher_with(vec![winner, failing], sink.clone());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m9","Heartbeat",{}]"#.into());

        let frames = sink.wait_for(1).await;
        assert!(matches!(
            Frame::parse(&frames[0]).unwrap(),
            Frame::CallResult { .. }
        ));
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn observer_only_processors_produce_no_response() {
        let sink = CapturingSink::new();
        let (observer, calls) = scripted(Behavior::Observe);
        let dispatcher = dispatcher_with(vec![observer], sink.clone());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"m10","Heartbeat",{}]"#.into());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sink.frames.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn responses_preserve_receipt_order_per_charge_point() {
        let sink = CapturingSink::new();
        let (slow, _) = scripted(Behavior::SlowDeliver(80));
        let dispatcher = dispatcher_with(vec![slow], sink.clone());

        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"first","Heartbeat",{}]"#.into());
        dispatcher.submit(&origin(), OcppVersion::V16, r#"[2,"second","Heartbeat",{}]"#.into());

        let frames = sink.wait_for(2).await;
        assert_eq!(Frame::parse(&frames[0]).unwrap().correlation_id(), "first");
        assert_eq!(Frame::parse(&frames[1]).unwrap().correlation_id(), "second");
    }
}
