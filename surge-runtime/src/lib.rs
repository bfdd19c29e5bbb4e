//! Command line runtime for surge: conformance suites, load and bench suites,
//! reports and an interactive shell.
pub mod config;
pub mod conformance;
pub mod interactive;
pub mod report;
pub mod suites;
pub mod workload;

mod error;
mod runtime;

pub use config::{Mode, RunConfig};
pub use error::{RuntimeError, StepError, SuiteError};
pub use runtime::SurgeRuntime;
pub use suites::{RunSummary, SuiteKind, SuiteOutcome};
