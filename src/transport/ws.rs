//! WebSocket server boundary
//!
//! Accepts charge point connections, negotiates the OCPP subprotocol,
//! and shuttles raw frames between the socket and the dispatcher. One
//! reader and one writer task per connection; every outbound frame goes
//! through the connection's channel so writes are serialized.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use super::negotiator::ProtocolNegotiator;
use super::outbound::OutboundCallTracker;
use super::registry::SharedConnectionRegistry;
use crate::domain::{ChargePointIdentity, OcppVersion};
use crate::engine::Dispatcher;
use crate::support::shutdown::ShutdownSignal;

/// OCPP WebSocket server.
pub struct OcppServer {
    address: String,
    registry: SharedConnectionRegistry,
    dispatcher: Arc<Dispatcher>,
    outbound: Arc<OutboundCallTracker>,
    negotiator: Arc<ProtocolNegotiator>,
    shutdown: Option<ShutdownSignal>,
}

impl OcppServer {
    pub fn new(
        address: impl Into<String>,
        registry: SharedConnectionRegistry,
        dispatcher: Arc<Dispatcher>,
        outbound: Arc<OutboundCallTracker>,
        negotiator: ProtocolNegotiator,
    ) -> Self {
        Self {
            address: address.into(),
            registry,
            dispatcher,
            outbound,
            negotiator: Arc::new(negotiator),
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Bind and serve until shutdown (when configured) or forever.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.address).await?;
        info!(address = self.address.as_str(), "OCPP server listening");

        loop {
            if let Some(shutdown) = &self.shutdown {
                tokio::select! {
                    accepted = listener.accept() => {
                        let (stream, peer) = accepted?;
                        self.spawn_connection(stream, peer);
                    }
                    _ = shutdown.notified().wait() => {
                        info!("OCPP server shutting down");
                        for identity in self.registry.connected_identities() {
                            self.registry.unregister(&identity);
                            self.dispatcher.remove_worker(&identity);
                        }
                        return Ok(());
                    }
                }
            } else {
                let (stream, peer) = listener.accept().await?;
                self.spawn_connection(stream, peer);
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let registry = self.registry.clone();
        let dispatcher = self.dispatcher.clone();
        let outbound = self.outbound.clone();
        let negotiator = self.negotiator.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            if let Err(e) =
                handle_connection(stream, peer, registry, dispatcher, outbound, negotiator, shutdown)
                    .await
            {
                error!(peer = %peer, error = %e, "Connection error");
            }
        });
    }
}

/// Charge point identifier from the request path:
/// `/ocpp/{identifier}` or `/{identifier}`.
fn identifier_from_path(path: &str) -> Option<String> {
    let path = path.trim_matches('/');
    let identifier = path.strip_prefix("ocpp/").unwrap_or(path);
    (!identifier.is_empty() && !identifier.contains('/')).then(|| identifier.to_string())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: SharedConnectionRegistry,
    dispatcher: Arc<Dispatcher>,
    outbound: Arc<OutboundCallTracker>,
    negotiator: Arc<ProtocolNegotiator>,
    shutdown: Option<ShutdownSignal>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut identifier: Option<String> = None;
    let mut version: Option<OcppVersion> = None;

    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, mut response: Response| {
        identifier = identifier_from_path(req.uri().path());

        let requested = req
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        version = negotiator.negotiate(requested);

        if let Some(version) = version {
            response.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                version
                    .subprotocol()
                    .parse()
                    .expect("static subprotocol is a valid header value"),
            );
        } else if !requested.is_empty() {
            warn!(peer = %peer, requested, "No mutually supported OCPP subprotocol");
        }

        Ok(response)
    })
    .await?;

    let identity = match identifier {
        Some(identifier) => ChargePointIdentity::new(identifier, None),
        None => {
            warn!(peer = %peer, "Missing charge point identifier in path");
            return Ok(());
        }
    };
    // A client that offered no subprotocol is treated as 1.6.
    let version = version.unwrap_or(OcppVersion::V16);

    info!(identity = %identity, %version, peer = %peer, "Charge point connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    registry.register(identity.clone(), tx, version);

    let writer_identity = identity.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(frame)).await {
                error!(identity = %writer_identity, error = %e, "Write failed");
                break;
            }
        }
    });

    let reader_identity = identity.clone();
    let reader_registry = registry.clone();
    let reader_dispatcher = dispatcher.clone();
    let reader = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    reader_registry.touch(&reader_identity);
                    reader_dispatcher.submit(&reader_identity, version, text);
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    reader_registry.touch(&reader_identity);
                }
                Ok(Message::Close(frame)) => {
                    info!(identity = %reader_identity, frame = ?frame, "Close frame");
                    break;
                }
                Ok(Message::Binary(data)) => {
                    warn!(
                        identity = %reader_identity,
                        bytes = data.len(),
                        "Ignoring binary message"
                    );
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    error!(identity = %reader_identity, error = %e, "Read failed");
                    break;
                }
            }
        }
    });

    match shutdown {
        Some(shutdown) => {
            tokio::select! {
                _ = writer => {}
                _ = reader => {}
                _ = shutdown.notified().wait() => {
                    info!(identity = %identity, "Closing connection for shutdown");
                }
            }
        }
        None => {
            tokio::select! {
                _ = writer => {}
                _ = reader => {}
            }
        }
    }

    registry.unregister(&identity);
    dispatcher.remove_worker(&identity);
    outbound.cleanup(&identity);
    info!(identity = %identity, "Charge point disconnected");

    Ok(())
}
