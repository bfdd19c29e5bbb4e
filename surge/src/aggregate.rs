use std::time::Duration;
use surge_core::{AggregateStats, LatencyStats, PhaseResult, WorkerOutcome, WorkerRow};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Folds the outcomes of a finished phase into a [`PhaseResult`].
///
/// RPS is computed against the configured `duration`, not the measured wall
/// clock. Percentiles run over the union of all worker reservoirs.
pub fn summarize(
    name: &str,
    workers: Vec<WorkerOutcome>,
    duration: Duration,
    settling_time: Option<Duration>,
) -> PhaseResult {
    let total_ok: u64 = workers.iter().map(|w| w.success_count).sum();
    let total_err = workers.iter().map(|w| w.error_count).sum();
    let total_client_limit = workers.iter().map(|w| w.client_limit_count).sum();

    let secs = duration.as_secs_f64();
    let total_rps = if secs > 0. {
        total_ok as f64 / secs
    } else {
        0.
    };

    let merged: Vec<Duration> = workers
        .iter()
        .flat_map(|w| w.latencies.samples().iter().copied())
        .collect();

    let aggregate = AggregateStats {
        total_ok,
        total_err,
        total_client_limit,
        total_rps,
        latency: LatencyStats::from_unsorted(merged),
    };
    debug!("{name}: {aggregate}");

    PhaseResult {
        name: name.to_string(),
        duration,
        aggregate,
        settling_time,
        breakdown: workers.iter().map(WorkerRow::from).collect(),
        workers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, LogNormal};

    fn worker(id: usize, ok: u64, err: u64, latencies_ms: &[u64]) -> WorkerOutcome {
        let mut rng = SmallRng::seed_from_u64(id as u64);
        let mut worker = WorkerOutcome::new(id, 100);
        worker.success_count = ok;
        worker.error_count = err;
        for ms in latencies_ms {
            worker.latencies.record(Duration::from_millis(*ms), &mut rng);
        }
        worker
    }

    #[test]
    fn sums_counts_and_derives_rps() {
        let mut storm = worker(1, 40, 1, &[1]);
        storm.client_limit_count = 7;
        let result = summarize(
            "Ingest",
            vec![worker(0, 60, 2, &[1]), storm],
            Duration::from_secs(4),
            Some(Duration::from_millis(12)),
        );

        assert_eq!(result.aggregate.total_ok, 100);
        assert_eq!(result.aggregate.total_err, 3);
        assert_eq!(result.aggregate.total_client_limit, 7);
        assert_eq!(result.aggregate.total_rps, 25.);
        assert_eq!(result.settling_time, Some(Duration::from_millis(12)));
        assert_eq!(result.breakdown.len(), 2);
        assert_eq!(result.breakdown[1].client_limit, 7);
    }

    #[test]
    fn zero_duration_has_zero_rps() {
        let result = summarize("Query", vec![worker(0, 10, 0, &[])], Duration::ZERO, None);
        assert_eq!(result.aggregate.total_rps, 0.);
    }

    #[test]
    fn percentiles_span_all_workers() {
        let result = summarize(
            "Mixed",
            vec![
                worker(0, 5, 0, &[10, 20, 30, 40, 50]),
                worker(1, 5, 0, &[60, 70, 80, 90, 100]),
            ],
            Duration::from_secs(1),
            None,
        );

        let latency = result.aggregate.latency;
        assert_eq!(latency.p50, Duration::from_millis(60));
        assert_eq!(latency.p90, Duration::from_millis(100));
        assert_eq!(latency.max, Duration::from_millis(100));
        assert_eq!(result.breakdown[0].latency.max, Duration::from_millis(50));
        assert_eq!(result.breakdown[1].latency.p50, Duration::from_millis(80));
    }

    #[test]
    fn empty_phase_is_all_zero() {
        let result = summarize("ConnStorm", vec![], Duration::from_secs(5), None);
        assert_eq!(result.aggregate, AggregateStats::default());
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn skewed_stream_keeps_tail_ordering() {
        let dist = LogNormal::new(0., 0.8).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut worker = WorkerOutcome::new(0, 1_000);
        for _ in 0..50_000 {
            let ms = dist.sample(&mut rng);
            worker.success_count += 1;
            worker
                .latencies
                .record(Duration::from_secs_f64(ms / 1e3), &mut rng);
        }

        let result = summarize("Ingest", vec![worker], Duration::from_secs(10), None);
        let latency = result.aggregate.latency;
        assert_eq!(result.aggregate.total_rps, 5_000.);
        assert!(latency.p50 <= latency.p90);
        assert!(latency.p90 <= latency.p95);
        assert!(latency.p95 <= latency.p99);
        assert!(latency.p99 <= latency.max);
        // Median of LogNormal(0, σ) is e^0 = 1ms.
        let p50_ms = latency.p50.as_secs_f64() * 1e3;
        assert!((0.8..1.25).contains(&p50_ms), "p50 {p50_ms}ms");
    }
}
