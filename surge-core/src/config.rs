use crate::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_PHASE_DURATION, DEFAULT_RESERVOIR_CAPACITY, DEFAULT_WORKERS,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How a worker manages its connection to the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// One connection per worker, reused for the whole phase.
    #[default]
    Persistent,
    /// One connection per request, closed right after the reply.
    Churn,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => write!(f, "persistent"),
            Self::Churn => write!(f, "churn"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown connection mode `{0}` (expected `persistent` or `churn`)")]
pub struct UnknownMode(String);

impl FromStr for ConnectionMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" => Ok(Self::Persistent),
            "churn" => Ok(Self::Churn),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Configuration of a single timed phase.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    pub workers: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    pub mode: ConnectionMode,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub call_timeout: Duration,
    pub reservoir_capacity: usize,
    pub max_tps: Option<NonZeroU32>,
}

impl PhaseConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            workers: DEFAULT_WORKERS,
            duration: DEFAULT_PHASE_DURATION,
            mode: ConnectionMode::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            reservoir_capacity: DEFAULT_RESERVOIR_CAPACITY,
            max_tps: None,
        }
    }
}
