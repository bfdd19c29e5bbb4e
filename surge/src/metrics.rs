//! Per-phase metric handles, compiled out without the `metrics` feature.
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct PhaseMetrics {
    #[cfg(feature = "metrics")]
    success: metrics::Counter,
    #[cfg(feature = "metrics")]
    error: metrics::Counter,
    #[cfg(feature = "metrics")]
    client_limit: metrics::Counter,
    #[cfg(feature = "metrics")]
    latency: metrics::Histogram,
}

impl PhaseMetrics {
    #[cfg(feature = "metrics")]
    pub fn new(phase: &str) -> Self {
        use surge_core::{
            CLIENT_LIMIT_COUNTER, ERROR_COUNTER, LATENCY_HISTOGRAM, PHASE_LABEL, SUCCESS_COUNTER,
        };

        metrics::describe_histogram!(LATENCY_HISTOGRAM, metrics::Unit::Seconds, "");
        let phase = phase.to_string();
        Self {
            success: metrics::counter!(SUCCESS_COUNTER, PHASE_LABEL => phase.clone()),
            error: metrics::counter!(ERROR_COUNTER, PHASE_LABEL => phase.clone()),
            client_limit: metrics::counter!(CLIENT_LIMIT_COUNTER, PHASE_LABEL => phase.clone()),
            latency: metrics::histogram!(LATENCY_HISTOGRAM, PHASE_LABEL => phase),
        }
    }

    #[cfg(not(feature = "metrics"))]
    pub fn new(_phase: &str) -> Self {
        Self {}
    }

    #[allow(unused_variables)]
    pub fn success(&self, latency: Duration) {
        #[cfg(feature = "metrics")]
        {
            self.success.increment(1);
            self.latency.record(latency.as_secs_f64());
        }
    }

    pub fn error(&self) {
        #[cfg(feature = "metrics")]
        self.error.increment(1);
    }

    pub fn client_limit(&self) {
        #[cfg(feature = "metrics")]
        self.client_limit.increment(1);
    }
}
