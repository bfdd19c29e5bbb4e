use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use mock_service::{MockConfig, MockService};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::EnvFilter;

static METRICS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs logging and the metrics recorder once per test binary.
#[allow(unused)]
pub fn init() -> &'static PrometheusHandle {
    METRICS.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("surge=debug,mock_service=info"))
            .with_test_writer()
            .try_init();

        PrometheusBuilder::new()
            .install_recorder()
            .expect("metrics recorder installs once")
    })
}

/// Starts a mock event store in the calling test's runtime.
#[allow(unused)]
pub async fn spawn_mock(config: MockConfig) -> (String, Arc<MockService>) {
    let (addr, service) = mock_service::spawn(config).await.unwrap();
    (addr.to_string(), service)
}

/// An address nothing listens on.
#[allow(unused)]
pub async fn dead_addr() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}
