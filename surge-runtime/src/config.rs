//! Command line and run configuration.
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use surge::TcpTransport;
use surge_core::{PhaseConfig, DEFAULT_ADDR, DEFAULT_CALL_TIMEOUT, DEFAULT_PHASE_DURATION, DEFAULT_WORKERS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Read commands from stdin and print the decoded replies.
    #[default]
    Interactive,
    /// Functional conformance suites.
    E2e,
    /// Load phases gated by health checks.
    Load,
    /// Standardized benchmark phases.
    Bench,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interactive => write!(f, "interactive"),
            Self::E2e => write!(f, "e2e"),
            Self::Load => write!(f, "load"),
            Self::Bench => write!(f, "bench"),
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Load and conformance harness for line-protocol event stores")]
pub(crate) struct SurgeCli {
    /// Address of the service under test.
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    addr: String,

    #[arg(short, long, value_enum, default_value_t = Mode::Interactive)]
    mode: Mode,

    /// Comma-separated suite filter (case-insensitive substring match).
    #[arg(short, long, value_delimiter = ',', default_value = "all")]
    suites: Vec<String>,

    /// Concurrent workers per load phase.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Duration of each load phase, in seconds.
    #[arg(short, long, default_value_t = DEFAULT_PHASE_DURATION.as_secs())]
    duration: u64,

    /// Per-call deadline, in milliseconds.
    #[arg(short, long, default_value_t = DEFAULT_CALL_TIMEOUT.as_millis() as u64)]
    timeout: u64,

    /// Export the load and bench results as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

impl From<SurgeCli> for RunConfig {
    fn from(cli: SurgeCli) -> Self {
        Self {
            mode: cli.mode,
            addr: cli.addr,
            suites: cli.suites,
            workers: cli.workers,
            duration: Duration::from_secs(cli.duration),
            call_timeout: Duration::from_millis(cli.timeout),
            json: cli.json,
        }
    }
}

/// Everything a run needs, whether it came from the command line or from the
/// [`SurgeRuntime`](crate::SurgeRuntime) builder.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub mode: Mode,
    pub addr: String,
    pub suites: Vec<String>,
    pub workers: usize,
    pub duration: Duration,
    pub call_timeout: Duration,
    pub json: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            addr: DEFAULT_ADDR.to_string(),
            suites: vec!["all".to_string()],
            workers: DEFAULT_WORKERS,
            duration: DEFAULT_PHASE_DURATION,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            json: None,
        }
    }
}

impl RunConfig {
    pub(crate) fn from_args() -> Self {
        SurgeCli::parse().into()
    }

    /// An empty filter or `all` selects every suite; otherwise any filter entry
    /// that is a case-insensitive substring of `name` selects it.
    pub fn should_run(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let filters: Vec<_> = self
            .suites
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        filters.is_empty()
            || filters
                .iter()
                .any(|filter| filter == "all" || name.contains(filter.as_str()))
    }

    /// Phase settings derived from the run configuration.
    pub fn phase(&self, name: &str, reservoir_capacity: usize) -> PhaseConfig {
        let mut config = PhaseConfig::new(name);
        config.workers = self.workers;
        config.duration = self.duration;
        config.call_timeout = self.call_timeout;
        config.reservoir_capacity = reservoir_capacity;
        config
    }

    pub fn transport(&self) -> Arc<TcpTransport> {
        Arc::new(TcpTransport::new(&self.addr).timeout(self.call_timeout))
    }
}
