mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_service::MockConfig;
    use std::time::Duration;
    use surge::prelude::*;
    use surge_runtime::interactive::repl;
    use surge_runtime::{Mode, SurgeRuntime};

    fn runtime(addr: &str, mode: Mode) -> SurgeRuntime {
        SurgeRuntime::new()
            .addr(addr)
            .mode(mode)
            .call_timeout(Duration::from_secs(2))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn e2e_suites_pass_against_the_mock() {
        init();
        let (addr, _service) = spawn_mock(MockConfig {
            index_lag: Duration::from_millis(20),
            ..MockConfig::default()
        })
        .await;

        let summary = runtime(&addr, Mode::E2e).run().await.unwrap();
        let names: Vec<_> = summary.suites.iter().map(|s| s.name).collect();

        assert_eq!(names, ["Ingest", "Query", "Pagination", "Robustness"]);
        assert!(summary.success(), "{:?}", summary.suites);
        assert!(summary.results.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn slow_index_fails_the_query_suite() {
        init();
        let (addr, _service) = spawn_mock(MockConfig {
            index_lag: Duration::from_secs(30),
            ..MockConfig::default()
        })
        .await;

        let summary = runtime(&addr, Mode::E2e)
            .suites(&["query"])
            .run()
            .await
            .unwrap();

        assert_eq!(summary.failed(), 1);
        let error = summary.suites[0].error.as_deref().unwrap();
        assert!(
            error.contains("test 'Query with Filtering' failed: step 4 failed"),
            "{error}"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(30_000)]
    async fn unreachable_service_fails_every_suite() {
        init();
        let addr = dead_addr().await;

        let summary = runtime(&addr, Mode::E2e).run().await.unwrap();
        assert_eq!(summary.failed(), 4);
        assert!(!summary.success());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(60_000)]
    async fn load_suite_reports_every_phase() {
        init();
        let (addr, _service) = spawn_mock(MockConfig {
            index_lag: Duration::from_millis(30),
            ..MockConfig::default()
        })
        .await;
        let path = std::env::temp_dir().join(format!("surge-load-{}.json", std::process::id()));

        let summary = runtime(&addr, Mode::Load)
            .workers(2)
            .duration(Duration::from_secs(1))
            .json(&path)
            .run()
            .await
            .unwrap();

        assert!(summary.success(), "{:?}", summary.suites);
        let names: Vec<_> = summary.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Ingest", "Query", "Mixed", "Complex", "ConnStorm"]);
        assert!(summary.results[0]
            .settling_time
            .is_some_and(|lag| lag >= Duration::from_millis(25)));
        assert!(summary.results[1].settling_time.is_none());
        assert!(summary.results.iter().all(|r| r.aggregate.total_ok > 0));

        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(exported["workers"], 2);
        assert_eq!(exported["duration_secs"], 1);
        assert_eq!(exported["address"], addr.as_str());
        assert_eq!(exported["results"].as_array().unwrap().len(), 5);
        assert_eq!(exported["results"][4]["name"], "ConnStorm");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(60_000)]
    async fn bench_suite_measures_settling_after_writes() {
        init();
        let (addr, _service) = spawn_mock(MockConfig::default()).await;

        let summary = runtime(&addr, Mode::Bench)
            .workers(2)
            .duration(Duration::from_secs(1))
            .run()
            .await
            .unwrap();

        assert!(summary.success());
        let phases: Vec<_> = summary
            .results
            .iter()
            .map(|r| (r.name.as_str(), r.settling_time.is_some()))
            .collect();
        assert_eq!(
            phases,
            [
                ("v1_100%_Ingest", true),
                ("v1_100%_Query", false),
                ("v1_50%_Mixed", true),
                ("v1_Complex_Payload", true),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(10_000)]
    async fn interactive_session_prints_replies_until_exit() {
        init();
        let (addr, service) = spawn_mock(MockConfig::default()).await;
        let mut conn = TcpTransport::new(&addr).connect().await.unwrap();

        let input: &[u8] =
            b"EVENT in:shell entity:u1 loc:ca\n\n  QUERY in:shell where:(loc:ca)\nquit\nEVENT in:shell entity:u2\n";
        let mut out = Vec::new();
        repl(&mut conn, input, &mut out).await.unwrap();
        conn.close().await;

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("> {\n  \"status\": \"OK\"\n}"), "{out}");
        assert!(out.contains("\"entity\": \"u1\""), "{out}");
        assert_eq!(service.requests(), 2);
    }
}
