//! Suite registry and runner.
use crate::config::{Mode, RunConfig};
use crate::error::{RuntimeError, SuiteError};
use crate::report;
use std::time::Duration;
use surge_core::PhaseResult;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

mod bench;
mod e2e;
mod load;

pub use e2e::{ingest_cases, pagination_cases, query_cases, robustness_cases};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuiteKind {
    Ingest,
    Query,
    Pagination,
    Robustness,
    Load,
    Bench,
}

const E2E_SUITES: &[SuiteKind] = &[
    SuiteKind::Ingest,
    SuiteKind::Query,
    SuiteKind::Pagination,
    SuiteKind::Robustness,
];

impl SuiteKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ingest => "Ingest",
            Self::Query => "Query",
            Self::Pagination => "Pagination",
            Self::Robustness => "Robustness",
            Self::Load => "Load",
            Self::Bench => "Bench",
        }
    }

    pub fn for_mode(mode: Mode) -> &'static [SuiteKind] {
        match mode {
            Mode::Interactive => &[],
            Mode::E2e => E2E_SUITES,
            Mode::Load => &[SuiteKind::Load],
            Mode::Bench => &[SuiteKind::Bench],
        }
    }

    /// Runs the suite. Phase results of load and bench suites are appended to
    /// `results` as each phase completes, so a failing suite still reports the
    /// phases it finished.
    #[instrument(name = "suite", skip_all, fields(suite = self.name()))]
    pub async fn run(
        self,
        config: &RunConfig,
        results: &mut Vec<PhaseResult>,
    ) -> Result<(), SuiteError> {
        match self {
            Self::Ingest => e2e::run(config, "ingest", ingest_cases).await,
            Self::Query => e2e::run(config, "query", query_cases).await,
            Self::Pagination => e2e::run(config, "pagination", pagination_cases).await,
            Self::Robustness => e2e::run(config, "robust", robustness_cases).await,
            Self::Load => load::run(config, results).await,
            Self::Bench => bench::run(config, results).await,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SuiteOutcome {
    pub name: &'static str,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl SuiteOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// What a non-interactive run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub suites: Vec<SuiteOutcome>,
    pub results: Vec<PhaseResult>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.suites.iter().filter(|s| s.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.suites.len() - self.passed()
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }
}

pub(crate) async fn run_suites(config: &RunConfig) -> Result<RunSummary, RuntimeError> {
    let selected: Vec<SuiteKind> = SuiteKind::for_mode(config.mode)
        .iter()
        .copied()
        .filter(|suite| config.should_run(suite.name()))
        .collect();
    if selected.is_empty() {
        return Err(RuntimeError::NoSuites(config.suites.clone()));
    }

    println!("Target: {} | Mode: {}", config.addr, config.mode);
    let mut summary = RunSummary::default();
    for suite in selected {
        println!("Running Suite: {}", suite.name());
        let start = Instant::now();
        let res = suite.run(config, &mut summary.results).await;
        let elapsed = start.elapsed();

        let error = match res {
            Ok(()) => {
                println!("  PASSED ({})", report::fmt_duration(elapsed));
                None
            }
            Err(err) => {
                error!("Suite {} failed: {err}", suite.name());
                println!("  FAILED: {err}");
                Some(err.to_string())
            }
        };
        summary.suites.push(SuiteOutcome {
            name: suite.name(),
            elapsed,
            error,
        });
    }

    if !summary.results.is_empty() {
        println!("{}", report::render(config, &summary.results));
        if let Some(path) = &config.json {
            report::export_json(path, config, &summary.results).await?;
            info!("Results written to {}", path.display());
        }
    }

    println!(
        "SUMMARY: {} passed, {} failed",
        summary.passed(),
        summary.failed()
    );
    Ok(summary)
}
