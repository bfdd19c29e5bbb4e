use mock_service::{run, MockConfig};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "127.0.0.1:7878";

fn env<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => Ok(Some(raw.parse()?)),
        Err(_) => Ok(None),
    }
}

/// Usage: `mock-service [addr]`. `MOCK_INDEX_LAG_MS`, `MOCK_ERROR_RATE`,
/// `MOCK_REPLY_DELAY_MS` and `MOCK_MAX_TPS` shape the service.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mock_service=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string())
        .parse()?;
    let config = MockConfig {
        index_lag: Duration::from_millis(env("MOCK_INDEX_LAG_MS")?.unwrap_or(0)),
        error_rate: env("MOCK_ERROR_RATE")?.unwrap_or(0.),
        reply_delay: Duration::from_millis(env("MOCK_REPLY_DELAY_MS")?.unwrap_or(0)),
        max_tps: env::<u32>("MOCK_MAX_TPS")?.and_then(NonZeroU32::new),
    };

    run(addr, config).await?;
    Ok(())
}
