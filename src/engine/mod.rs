//! Protocol engine: registry, dispatcher, session and connector state

pub mod connectors;
pub mod dispatcher;
pub mod processor;
pub mod processors;
pub mod registry;
pub mod sessions;

pub use connectors::{ConnectorStatusTracker, StatusReport};
pub use dispatcher::{Dispatcher, FrameSink, ReplyRouter};
pub use processor::{ActionProcessor, ProcessError};
pub use registry::ProcessorRegistry;
pub use sessions::{
    start_session_purge_task, AuthorizationError, ChargeSessionManager, SessionConfig,
    SessionError, StartSessionInfo,
};

use std::sync::Arc;

use crate::authorization::AuthorizationService;
use crate::store::Store;

/// Wire the standard processor set into a fresh registry.
pub fn standard_registry(
    store: Arc<dyn Store>,
    authorization: Arc<dyn AuthorizationService>,
    sessions: Arc<ChargeSessionManager>,
    tracker: Arc<ConnectorStatusTracker>,
    heartbeat_interval_secs: i32,
) -> Arc<ProcessorRegistry> {
    let registry = Arc::new(ProcessorRegistry::new());
    registry.register(Arc::new(processors::BootNotificationProcessor::new(
        store.clone(),
        heartbeat_interval_secs,
    )));
    registry.register(Arc::new(processors::AuthorizeProcessor::new(
        authorization.clone(),
    )));
    registry.register(Arc::new(processors::StartTransactionProcessor::new(
        sessions.clone(),
        store.clone(),
    )));
    registry.register(Arc::new(processors::StopTransactionProcessor::new(
        sessions.clone(),
        authorization,
        store.clone(),
    )));
    registry.register(Arc::new(processors::MeterValuesProcessor::new(
        sessions.clone(),
        store.clone(),
    )));
    registry.register(Arc::new(processors::StatusNotificationProcessor::new(
        tracker,
        store.clone(),
    )));
    registry.register(Arc::new(processors::TransactionEventProcessor::new(
        sessions, store,
    )));
    registry.register(Arc::new(processors::HeartbeatProcessor));
    registry.register(Arc::new(processors::StationNotificationProcessor));
    registry.register(Arc::new(processors::DataTransferProcessor));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::StaticAuthorizationService;
    use crate::domain::{ChargePointIdentity, ConnectorKey, ConnectorStatus, DomainResult, OcppVersion};
    use crate::protocol::v16::V16Decoder;
    use crate::protocol::v201::V201Decoder;
    use crate::protocol::Frame;
    use crate::store::InMemoryStore;
    use std::sync::Mutex;
    use std::time::Duration;

    struct CapturingSink {
        frames: Mutex<Vec<String>>,
    }

    impl FrameSink for CapturingSink {
        fn send_frame(&self, _origin: &ChargePointIdentity, frame: String) -> DomainResult<()> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    impl CapturingSink {
        async fn wait_for(&self, count: usize) -> Vec<String> {
            for _ in 0..300 {
                {
                    let frames = self.frames.lock().unwrap();
                    if frames.len() >= count {
                        return frames.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("timed out waiting for {} frames", count);
        }
    }

    struct Engine {
        dispatcher: Arc<Dispatcher>,
        sink: Arc<CapturingSink>,
        tracker: Arc<ConnectorStatusTracker>,
        store: Arc<InMemoryStore>,
    }

    fn engine() -> Engine {
        let store = Arc::new(InMemoryStore::new());
        let authorization = Arc::new(StaticAuthorizationService::with_accepted(["tag1"]));
        let sessions = Arc::new(ChargeSessionManager::new(
            store.clone(),
            authorization.clone(),
            SessionConfig::default(),
        ));
        let tracker = Arc::new(ConnectorStatusTracker::new(store.clone()));
        let registry = standard_registry(
            store.clone(),
            authorization,
            sessions,
            tracker.clone(),
            300,
        );
        let sink = Arc::new(CapturingSink {
            frames: Mutex::new(Vec::new()),
        });
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            vec![Arc::new(V16Decoder), Arc::new(V201Decoder)],
            sink.clone(),
            None,
        ));
        Engine {
            dispatcher,
            sink,
            tracker,
            store,
        }
    }

    #[tokio::test]
    async fn full_charging_scenario() {
        let engine = engine();
        let origin = ChargePointIdentity::new("CP001", None);
        let submit = |raw: &str| {
            engine
                .dispatcher
                .submit(&origin, OcppVersion::V16, raw.to_string())
        };

        submit(
            r#"[2,"b1","BootNotification",{"chargePointVendor":"Acme","chargePointModel":"One"}]"#,
        );
        submit(
            r#"[2,"s1","StartTransaction",{"connectorId":1,"idTag":"tag1","meterStart":1000,"timestamp":"2024-06-01T10:00:00Z"}]"#,
        );
        let frames = engine.sink.wait_for(2).await;

        let transaction_id = match Frame::parse(&frames[1]).unwrap() {
            Frame::CallResult {
                correlation_id,
                payload,
            } => {
                assert_eq!(correlation_id, "s1");
                assert_eq!(payload["idTagInfo"]["status"], "Accepted");
                let tx = payload["transactionId"].as_i64().unwrap();
                assert!(tx > 0);
                tx
            }
            other => panic!("expected CallResult, got {:?}", other),
        };

        submit(&format!(
            r#"[2,"mv1","MeterValues",{{"connectorId":1,"transactionId":{},"meterValue":[{{"timestamp":"2024-06-01T10:05:00Z","sampledValue":[{{"measurand":"Energy.Active.Import.Register","value":"1234","unit":"Wh"}}]}}]}}]"#,
            transaction_id
        ));
        submit(
            r#"[2,"sn1","StatusNotification",{"connectorId":1,"errorCode":"NoError","status":"Charging"}]"#,
        );
        engine.sink.wait_for(4).await;

        // The reading is stamped with the session created by the start.
        let cp = engine
            .store
            .charge_point_by_identity(&origin)
            .await
            .unwrap()
            .unwrap();
        let session = engine
            .store
            .incomplete_session_by_transaction(cp.id, &transaction_id.to_string())
            .await
            .unwrap()
            .unwrap();
        let readings = engine.store.readings_for_session(session.id).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, "1234");

        // The tracker reports the connector as charging.
        let status = engine
            .tracker
            .status(&ConnectorKey::new(cp.id, 1))
            .unwrap();
        assert_eq!(status.status, ConnectorStatus::Charging);
    }

    #[tokio::test]
    async fn empty_payload_actions_work_end_to_end() {
        let engine = engine();
        let origin = ChargePointIdentity::new("CP002", None);
        engine
            .dispatcher
            .submit(&origin, OcppVersion::V16, r#"[2,"h1","Heartbeat",{}]"#.into());
        engine
            .dispatcher
            .submit(&origin, OcppVersion::V16, r#"[2,"h2","Heartbeat",null]"#.into());

        let frames = engine.sink.wait_for(2).await;
        for frame in &frames {
            match Frame::parse(frame).unwrap() {
                Frame::CallResult { payload, .. } => {
                    assert!(payload["currentTime"].is_string());
                }
                other => panic!("expected CallResult, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn v201_boot_and_status_share_the_engine() {
        let engine = engine();
        let origin = ChargePointIdentity::new("CS777", None);
        engine.dispatcher.submit(
            &origin,
            OcppVersion::V201,
            r#"[2,"b1","BootNotification",{"chargingStation":{"model":"Two","vendorName":"Acme"},"reason":"PowerUp"}]"#.into(),
        );
        engine.dispatcher.submit(
            &origin,
            OcppVersion::V201,
            r#"[2,"sn1","StatusNotification",{"timestamp":"2024-06-01T10:00:00Z","connectorStatus":"Occupied","evseId":1,"connectorId":1}]"#.into(),
        );
        engine.sink.wait_for(2).await;

        let cp = engine
            .store
            .charge_point_by_identity(&origin)
            .await
            .unwrap()
            .unwrap();
        let status = engine
            .tracker
            .status(&ConnectorKey::new(cp.id, 1))
            .unwrap();
        assert_eq!(status.status, ConnectorStatus::Charging);
    }
}
