use std::io::{self, ErrorKind};
use std::time::Duration;
use surge_core::ShapeError;
use thiserror::Error;

/// Failure signatures that point at the test client running out of local
/// resources (ephemeral ports, socket buffers, file descriptors) rather than at
/// the service under test.
const CLIENT_LIMIT_SIGNATURES: &[&str] = &[
    "assign requested address",
    "no buffer space",
    "too many open files",
    "address in use",
    "address already in use",
];

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("failed to decode reply: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("{op} timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("connection closed by peer")]
    Closed,
}

impl TransportError {
    /// Whether this failure was caused by local resource exhaustion while
    /// establishing a connection.
    pub fn is_client_limit(&self) -> bool {
        match self {
            Self::Connect(err) => is_local_exhaustion(err),
            _ => false,
        }
    }
}

fn is_local_exhaustion(err: &io::Error) -> bool {
    if matches!(err.kind(), ErrorKind::AddrNotAvailable | ErrorKind::AddrInUse) {
        return true;
    }
    let msg = err.to_string().to_ascii_lowercase();
    CLIENT_LIMIT_SIGNATURES.iter().any(|sig| msg.contains(sig))
}

/// A reply that arrived but did not meet expectations.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("expected status OK, got {0}")]
    NotOk(String),

    #[error("expected an error, got OK")]
    UnexpectedOk,

    #[error("expected {expected} objects, got {actual}")]
    Count { expected: usize, actual: usize },

    #[error("no objects returned")]
    NoObjects,

    #[error("expected entity '{expected}', got '{actual}'")]
    Entity { expected: String, actual: String },

    #[error("expected next_cursor '{expected}', got '{actual}'")]
    NextCursor { expected: String, actual: String },

    #[error("unexpected reply shape: {0}")]
    Shape(#[from] ShapeError),
}

/// Post-hoc judgment that a phase did not behave like a healthy service.
#[derive(Debug, Error, PartialEq)]
pub enum HealthError {
    #[error("{phase} phase produced 0 successful requests (system down?)")]
    NoSuccesses { phase: String },

    #[error("{phase} phase server error rate {:.2}% exceeded limit ({:.0}%)", rate * 100., limit * 100.)]
    ErrorRateExceeded { phase: String, rate: f64, limit: f64 },
}

#[derive(Debug, Error)]
pub enum SettleError {
    #[error("probe transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("probe write rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("timeout waiting for indexer after {attempts} attempts")]
    Timeout { attempts: u32 },
}
