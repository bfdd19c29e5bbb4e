mod config;
mod constants;
mod metrics;
mod reservoir;
mod stats;
mod value;

pub use config::*;
pub use constants::*;
pub use metrics::*;
pub use reservoir::*;
pub use stats::*;
pub use value::*;
