use surge_runtime::SurgeRuntime;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("surge=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let summary = SurgeRuntime::new().with_args().run().await?;
    if !summary.success() {
        std::process::exit(1);
    }
    Ok(())
}
