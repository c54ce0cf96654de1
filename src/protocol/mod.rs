//! Protocol layer: framing, envelopes, errors and per-version decoding

pub mod decoder;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod v16;
pub mod v201;

pub use decoder::{is_empty_payload, PayloadDecoder};
pub use envelope::{CallOutcome, Envelope, ResultSink};
pub use error::{ErrorKind, OcppError};
pub use frame::Frame;

/// A decoded payload of any supported protocol version.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    V16(v16::Payload),
    V201(v201::Payload),
}

impl Payload {
    pub fn as_v16(&self) -> Option<&v16::Payload> {
        match self {
            Self::V16(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_v201(&self) -> Option<&v201::Payload> {
        match self {
            Self::V201(payload) => Some(payload),
            _ => None,
        }
    }
}
