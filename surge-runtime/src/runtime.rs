//! Runtime entry point.
use crate::config::{Mode, RunConfig};
use crate::error::RuntimeError;
use crate::interactive;
use crate::suites::{run_suites, RunSummary};
use std::path::PathBuf;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

/// Runs the suites of one mode against a service, or an interactive session.
///
/// # Example
///
/// ```no_run
/// use surge_runtime::SurgeRuntime;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let summary = SurgeRuntime::new().with_args().run().await?;
///     if !summary.success() {
///         std::process::exit(1);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SurgeRuntime {
    config: RunConfig,
}

impl SurgeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the command line arguments.
    ///
    /// `-a`, `--addr` address of the service (default `127.0.0.1:7878`)
    ///
    /// `-m`, `--mode` one of `interactive`, `e2e`, `load`, `bench`
    ///
    /// `-s`, `--suites` comma-separated suite filter (default `all`)
    ///
    /// `-w`, `--workers`, `-d`, `--duration` (seconds) and `-t`, `--timeout`
    /// (milliseconds) shape the load phases; `--json <path>` exports results.
    ///
    /// # Example
    /// ```ignore
    /// $ surge -m e2e -s query,pagination
    /// $ surge -m load -w 64 -d 30 --json results.json
    /// ```
    pub fn with_args(mut self) -> Self {
        self.config = RunConfig::from_args();
        self
    }

    pub fn addr(mut self, addr: &str) -> Self {
        self.config.addr = addr.to_string();
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn suites(mut self, suites: &[&str]) -> Self {
        self.config.suites = suites.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    pub fn json(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.json = Some(path.into());
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[instrument(name = "surge", skip_all, fields(mode = %self.config.mode, addr = %self.config.addr))]
    pub async fn run(self) -> Result<RunSummary, RuntimeError> {
        info!("Starting {} run", self.config.mode);
        match self.config.mode {
            Mode::Interactive => {
                interactive::run(&self.config).await?;
                Ok(RunSummary::default())
            }
            _ => run_suites(&self.config).await,
        }
    }
}
