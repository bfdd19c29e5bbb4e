#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod error;
pub mod health;
pub mod phase;
pub mod settle;
pub mod tcp;
pub mod transport;
pub mod validate;

pub(crate) mod metrics;
pub(crate) mod signal;
pub(crate) mod worker;

pub use aggregate::summarize;
pub use error::{HealthError, SettleError, TransportError, ValidationError};
pub use health::check_health;
pub use phase::Phase;
pub use settle::SettlingProbe;
pub use tcp::TcpTransport;

pub mod prelude {
    pub use crate::aggregate::summarize;
    pub use crate::health::check_health;
    pub use crate::phase::{ConfigurablePhase, Phase};
    pub use crate::settle::SettlingProbe;
    pub use crate::tcp::TcpTransport;
    pub use crate::transport::{Connection, Transport};
    pub use crate::validate::{
        expect_count, expect_entity, expect_error, expect_next_cursor, expect_objects, expect_ok,
    };

    pub use rand::rngs::SmallRng;
    pub use rand::Rng;
    pub use surge_core::{ConnectionMode, PhaseResult, Value, WorkerOutcome};
}
