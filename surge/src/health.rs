use crate::error::HealthError;
use surge_core::{WorkerOutcome, MAX_SERVER_ERROR_RATE};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Phase-level gate: a phase is healthy when it produced at least one success
/// and its error rate stays within [`MAX_SERVER_ERROR_RATE`].
///
/// Client-limit failures are charged to the service only when
/// `ignore_client_limits` is false.
pub fn check_health(
    phase: &str,
    workers: &[WorkerOutcome],
    ignore_client_limits: bool,
) -> Result<(), HealthError> {
    let successes: u64 = workers.iter().map(|w| w.success_count).sum();
    let mut errors: u64 = workers.iter().map(|w| w.error_count).sum();
    if !ignore_client_limits {
        errors += workers.iter().map(|w| w.client_limit_count).sum::<u64>();
    }

    if successes == 0 {
        return Err(HealthError::NoSuccesses {
            phase: phase.to_string(),
        });
    }

    let rate = errors as f64 / (errors + successes) as f64;
    debug!("{phase} error rate {:.4}", rate);
    if rate > MAX_SERVER_ERROR_RATE {
        return Err(HealthError::ErrorRateExceeded {
            phase: phase.to_string(),
            rate,
            limit: MAX_SERVER_ERROR_RATE,
        });
    }

    Ok(())
}
