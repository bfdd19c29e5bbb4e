mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_service::MockConfig;
    use std::num::NonZeroU32;
    use std::sync::Arc;
    use std::time::Duration;
    use surge::prelude::*;
    use surge::{HealthError, SettleError};

    fn ingest(ns: &'static str) -> impl Fn(&mut SmallRng, usize) -> String + Send + Sync + 'static {
        move |rng: &mut SmallRng, id: usize| {
            format!(
                "EVENT in:{ns} entity:user_{} loc:aws-us-east worker:{id}",
                rng.gen_range(0..100)
            )
        }
    }

    fn totals(workers: &[WorkerOutcome]) -> (u64, u64, u64) {
        workers.iter().fold((0, 0, 0), |(ok, err, lim), w| {
            (
                ok + w.success_count,
                err + w.error_count,
                lim + w.client_limit_count,
            )
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn persistent_phase_accounts_for_every_request() {
        init();
        let (addr, service) = spawn_mock(MockConfig::default()).await;

        let workers = Phase::new("Ingest", Arc::new(TcpTransport::new(&addr)), ingest("persist"))
            .workers(8)
            .duration(Duration::from_millis(500))
            .validator(expect_ok)
            .await;

        let (ok, err, _) = totals(&workers);
        assert!(ok > 0);
        assert_eq!(err, 0);
        assert_eq!(ok + err, service.requests());
        assert!(check_health("Ingest", &workers, false).is_ok());

        let result = summarize("Ingest", workers, Duration::from_millis(500), None);
        let latency = result.aggregate.latency;
        assert!(result.aggregate.total_rps > 0.);
        assert!(latency.p50 <= latency.p99);
        assert!(latency.p99 <= latency.max);
        assert_eq!(result.breakdown.len(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn churn_phase_opens_a_connection_per_request() {
        init();
        let (addr, service) = spawn_mock(MockConfig::default()).await;

        let workers = Phase::new("ConnStorm", Arc::new(TcpTransport::new(&addr)), |_, _| {
            "QUERY in:storm where:(loc:aws-us-east) take:1".to_string()
        })
        .workers(2)
        .churn()
        .duration(Duration::from_millis(300))
        .validator(expect_objects)
        .await;

        let (ok, err, _) = totals(&workers);
        assert!(ok > 0);
        assert_eq!(ok + err, service.requests());
        assert!(check_health("ConnStorm", &workers, true).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn injected_errors_fail_the_health_gate() {
        init();
        let (addr, _service) = spawn_mock(MockConfig {
            error_rate: 0.2,
            ..MockConfig::default()
        })
        .await;

        let workers = Phase::new("Query", Arc::new(TcpTransport::new(&addr)), ingest("faulty"))
            .workers(4)
            .duration(Duration::from_millis(300))
            .validator(expect_ok)
            .await;

        let (ok, err, _) = totals(&workers);
        assert!(ok > 0);
        assert!(err > 0);
        assert!(matches!(
            check_health("Query", &workers, false),
            Err(HealthError::ErrorRateExceeded { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn unreachable_service_has_no_successes() {
        init();
        let addr = dead_addr().await;

        let workers = Phase::new("Ingest", Arc::new(TcpTransport::new(&addr)), ingest("dead"))
            .workers(3)
            .duration(Duration::from_millis(100))
            .call_timeout(Duration::from_millis(200))
            .await;

        let (ok, err, _) = totals(&workers);
        assert_eq!(ok, 0);
        assert_eq!(err, 3);
        assert_eq!(
            check_health("Ingest", &workers, false),
            Err(HealthError::NoSuccesses {
                phase: "Ingest".to_string()
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn tps_cap_holds_against_a_real_socket() {
        init();
        let (addr, service) = spawn_mock(MockConfig::default()).await;

        let workers = Phase::new("Capped", Arc::new(TcpTransport::new(&addr)), ingest("capped"))
            .workers(4)
            .tps(NonZeroU32::new(100).unwrap())
            .duration(Duration::from_secs(1))
            .await;

        let (ok, _, _) = totals(&workers);
        assert!(ok >= 50, "{ok}");
        assert!(ok <= 210, "{ok}");
        assert_eq!(ok, service.requests());
    }

    fn probe(ns: &'static str) -> SettlingProbe {
        SettlingProbe::new(
            move |marker| format!("EVENT in:{ns} entity:{marker} probe:{marker}"),
            move |marker| format!("QUERY in:{ns} where:(probe:{marker})"),
        )
        .interval(Duration::from_millis(5))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn settling_time_tracks_index_lag() {
        init();
        let (addr, _service) = spawn_mock(MockConfig {
            index_lag: Duration::from_millis(150),
            ..MockConfig::default()
        })
        .await;

        let settled = probe("lagging")
            .measure(&TcpTransport::new(&addr))
            .await
            .unwrap();
        assert!(settled >= Duration::from_millis(140), "{settled:?}");
        assert!(settled < Duration::from_secs(2), "{settled:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn settling_times_out_when_never_indexed() {
        init();
        let (addr, _service) = spawn_mock(MockConfig {
            index_lag: Duration::from_secs(3600),
            ..MockConfig::default()
        })
        .await;

        let res = probe("stuck")
            .max_attempts(10)
            .measure(&TcpTransport::new(&addr))
            .await;
        assert!(matches!(res, Err(SettleError::Timeout { attempts: 10 })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn phases_publish_metrics() {
        let handle = init();
        let (addr, _service) = spawn_mock(MockConfig::default()).await;

        Phase::new("Metered", Arc::new(TcpTransport::new(&addr)), ingest("metered"))
            .workers(2)
            .duration(Duration::from_millis(200))
            .await;

        let rendered = handle.render();
        assert!(
            rendered.contains("surge_requests_success{phase=\"Metered\"}"),
            "{rendered}"
        );
        assert!(rendered.contains("surge_request_latency"), "{rendered}");
    }
}
