//! Connection handle
//!
//! One handle per live charge point connection: the outbound channel
//! sender plus bookkeeping. All writes for a connection funnel through
//! the single sender, so frames are never interleaved on one socket.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::domain::{ChargePointIdentity, DomainError, DomainResult, OcppVersion};

/// An active connection to a charge point.
#[derive(Debug)]
pub struct Connection {
    pub identity: ChargePointIdentity,
    /// Outbound frame channel; the writer task drains it onto the socket.
    pub sender: mpsc::UnboundedSender<String>,
    /// Protocol version negotiated during the handshake.
    pub version: OcppVersion,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        identity: ChargePointIdentity,
        sender: mpsc::UnboundedSender<String>,
        version: OcppVersion,
    ) -> Self {
        let now = Utc::now();
        Self {
            identity,
            sender,
            version,
            connected_at: now,
            last_activity: now,
        }
    }

    /// Queue a frame for the writer task.
    pub fn send(&self, frame: String) -> DomainResult<()> {
        self.sender
            .send(frame)
            .map_err(|_| DomainError::NotConnected(self.identity.to_string()))
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Whether the connection has been quiet for longer than `timeout_secs`.
    pub fn is_stale(&self, timeout_secs: i64) -> bool {
        Utc::now()
            .signed_duration_since(self.last_activity)
            .num_seconds()
            > timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> (Connection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new(
            ChargePointIdentity::new("CP001", None),
            tx,
            OcppVersion::V16,
        );
        (conn, rx)
    }

    #[test]
    fn send_delivers_to_writer_channel() {
        let (conn, mut rx) = make_connection();
        conn.send("[2,\"m\",\"Heartbeat\",{}]".into()).unwrap();
        assert!(rx.try_recv().unwrap().contains("Heartbeat"));
    }

    #[test]
    fn send_after_writer_gone_is_an_error() {
        let (conn, rx) = make_connection();
        drop(rx);
        assert!(conn.send("x".into()).is_err());
    }

    #[test]
    fn staleness() {
        let (mut conn, _rx) = make_connection();
        assert!(!conn.is_stale(3600));
        conn.last_activity = Utc::now() - chrono::Duration::seconds(10);
        assert!(conn.is_stale(5));
        conn.touch();
        assert!(!conn.is_stale(5));
    }
}
