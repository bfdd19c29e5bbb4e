use crate::LatencyReservoir;
use serde::Serialize;
use serde_with::{serde_as, DurationMilliSecondsWithFrac, DurationSeconds};
use std::fmt;
use std::time::Duration;

/// Per-worker counters and latency sample for one phase.
///
/// Owned by its worker while the phase runs and handed to the aggregator once
/// the worker has stopped.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub id: usize,
    pub success_count: u64,
    pub error_count: u64,
    pub client_limit_count: u64,
    pub latencies: LatencyReservoir,
}

impl WorkerOutcome {
    pub fn new(id: usize, reservoir_capacity: usize) -> Self {
        Self {
            id,
            success_count: 0,
            error_count: 0,
            client_limit_count: 0,
            latencies: LatencyReservoir::with_capacity(reservoir_capacity),
        }
    }

    /// Requests that reached a terminal outcome (success or error).
    pub fn attempts(&self) -> u64 {
        self.success_count + self.error_count
    }
}

/// Nearest-rank percentile over an ascending sample.
///
/// The index is `floor(len * p)` clamped to the last element; an empty sample
/// yields zero.
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = (sorted.len() as f64 * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p50: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p90: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p95: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p99: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub max: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub mean: Duration,
}

impl LatencyStats {
    pub fn from_sorted(sorted: &[Duration]) -> Self {
        let Some(max) = sorted.last().copied() else {
            return Self::default();
        };
        let secs: Vec<f64> = sorted.iter().map(Duration::as_secs_f64).collect();

        Self {
            p50: percentile(sorted, 0.50),
            p90: percentile(sorted, 0.90),
            p95: percentile(sorted, 0.95),
            p99: percentile(sorted, 0.99),
            max,
            mean: Duration::from_secs_f64(statistical::mean(&secs).max(0.)),
        }
    }

    pub fn from_unsorted(mut samples: Vec<Duration>) -> Self {
        samples.sort_unstable();
        Self::from_sorted(&samples)
    }
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p50={:?}, p90={:?}, p95={:?}, p99={:?}, max={:?}",
            self.p50, self.p90, self.p95, self.p99, self.max,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_ok: u64,
    pub total_err: u64,
    pub total_client_limit: u64,
    pub total_rps: f64,
    #[serde(flatten)]
    pub latency: LatencyStats,
}

impl fmt::Display for AggregateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OK={}, Err={}, ClientLimit={}, RPS={:.2}, {}",
            self.total_ok, self.total_err, self.total_client_limit, self.total_rps, self.latency,
        )
    }
}

/// One line of the detailed per-worker breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRow {
    pub id: usize,
    pub ok: u64,
    pub err: u64,
    pub client_limit: u64,
    #[serde(flatten)]
    pub latency: LatencyStats,
}

impl From<&WorkerOutcome> for WorkerRow {
    fn from(worker: &WorkerOutcome) -> Self {
        Self {
            id: worker.id,
            ok: worker.success_count,
            err: worker.error_count,
            client_limit: worker.client_limit_count,
            latency: LatencyStats::from_unsorted(worker.latencies.samples().to_vec()),
        }
    }
}

/// Summary of one completed phase.
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub name: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    pub aggregate: AggregateStats,
    #[serde_as(as = "Option<DurationMilliSecondsWithFrac<f64>>")]
    pub settling_time: Option<Duration>,
    #[serde(rename = "workers")]
    pub breakdown: Vec<WorkerRow>,
    #[serde(skip)]
    pub workers: Vec<WorkerOutcome>,
}
