use std::time::Duration;

/// Address of the event store when none is supplied.
pub const DEFAULT_ADDR: &str = "127.0.0.1:7878";

/// Reservoir capacity used by the load suites.
pub const DEFAULT_RESERVOIR_CAPACITY: usize = 10_000;

/// Reservoir capacity used by the standardized bench suite.
pub const BENCH_RESERVOIR_CAPACITY: usize = 20_000;

/// Deadline applied to every connect, send and receive.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_WORKERS: usize = 20;

pub const DEFAULT_PHASE_DURATION: Duration = Duration::from_secs(5);

/// Highest server error rate a phase may show and still be considered healthy.
pub const MAX_SERVER_ERROR_RATE: f64 = 0.01;

/// Delay between two settling-time polls.
pub const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll budget of the settling-time probe (2 minutes at the default interval).
pub const SETTLE_MAX_ATTEMPTS: u32 = 12_000;
