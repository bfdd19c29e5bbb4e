use std::io;
use surge::{HealthError, SettleError, TransportError, ValidationError};
use thiserror::Error;

/// Failure of a single conformance step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("send failed: {0}")]
    Send(#[source] TransportError),

    #[error("read failed: {0}")]
    Read(#[source] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid SLEEP duration `{input}`: {source}")]
    Sleep {
        input: String,
        #[source]
        source: humantime::DurationError,
    },
}

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("failed to connect: {0}")]
    Connect(#[source] TransportError),

    #[error("test '{name}' failed: step {step} failed: {source}")]
    Step {
        name: String,
        step: usize,
        #[source]
        source: StepError,
    },

    #[error("FAILURE: {0}")]
    Health(#[from] HealthError),

    #[error("settling time: {0}")]
    Settle(#[from] SettleError),
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no suite matches {0:?}")]
    NoSuites(Vec<String>),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: TransportError,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to export results: {0}")]
    Export(#[from] serde_json::Error),

    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}
