//! OCPP central system entry point
//!
//! Wires the engine against the in-memory store and authorization
//! collaborators and serves OCPP over WebSocket. Configuration comes
//! from a TOML file (`OCPP_CONFIG` env var or the platform config dir).

use std::sync::Arc;

use tracing::{error, info};

use ocpp_engine::config::{default_config_path, AppConfig};
use ocpp_engine::engine::{
    standard_registry, start_session_purge_task, ChargeSessionManager, ConnectorStatusTracker,
    Dispatcher,
};
use ocpp_engine::protocol::v16::V16Decoder;
use ocpp_engine::protocol::v201::V201Decoder;
use ocpp_engine::protocol::PayloadDecoder;
use ocpp_engine::support::shutdown::{listen_for_shutdown_signals, ShutdownSignal};
use ocpp_engine::transport::{ConnectionRegistry, OcppServer, OutboundCallTracker, ProtocolNegotiator};
use ocpp_engine::{InMemoryStore, StaticAuthorizationService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("OCPP_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let config = match AppConfig::load(&config_path) {
        Ok(config) => {
            init_logging(&config.logging.level);
            info!(path = %config_path.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            let config = AppConfig::default();
            init_logging(&config.logging.level);
            error!(error = %e, "Failed to load config; using defaults");
            config
        }
    };

    info!("Starting OCPP central system");

    // Collaborators. The in-memory implementations stand in for the
    // external store and authorization services.
    let store = Arc::new(InMemoryStore::new());
    let authorization = Arc::new(StaticAuthorizationService::with_accepted([
        "TEST001", "TEST002",
    ]));

    // Engine state.
    let sessions = Arc::new(ChargeSessionManager::new(
        store.clone(),
        authorization.clone(),
        config.sessions.session_config(),
    ));
    let tracker = Arc::new(ConnectorStatusTracker::new(store.clone()));
    let registry = standard_registry(
        store.clone(),
        authorization,
        sessions.clone(),
        tracker,
        config.protocol.heartbeat_interval_secs,
    );

    // Transport plumbing.
    let decoders: Vec<Arc<dyn PayloadDecoder>> = vec![Arc::new(V16Decoder), Arc::new(V201Decoder)];
    let connections = ConnectionRegistry::shared();
    let outbound = Arc::new(OutboundCallTracker::new(
        connections.clone(),
        decoders.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        decoders,
        connections.clone(),
        Some(outbound.clone()),
    ));

    // Background maintenance and shutdown handling.
    let shutdown = ShutdownSignal::new();
    tokio::spawn(listen_for_shutdown_signals(shutdown.clone()));
    start_session_purge_task(
        sessions,
        shutdown.clone(),
        config.sessions.purge_interval_secs,
    );

    let negotiator = ProtocolNegotiator::new(config.protocol.versions());
    let server = OcppServer::new(
        config.server.address(),
        connections,
        dispatcher,
        outbound,
        negotiator,
    )
    .with_shutdown(shutdown);

    server.run().await
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}
