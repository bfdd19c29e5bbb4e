//! Phase logic
use crate::error::ValidationError;
use crate::metrics::PhaseMetrics;
use crate::signal::StopSignal;
use crate::transport::Transport;
use crate::worker::{Worker, WorkerShared};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::rngs::SmallRng;
use std::{
    future::Future,
    num::NonZeroU32,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use surge_core::{ConnectionMode, PhaseConfig, Value, WorkerOutcome};
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

pub use crate::worker::{Generator, SharedValidator};

/// A timed load phase.
///
/// Built with [`Phase::new`], configured through [`ConfigurablePhase`] and
/// started by awaiting it. Resolves to the outcome of every worker, ordered by
/// worker id.
#[pin_project::pin_project]
pub struct Phase<T> {
    transport: Arc<T>,
    generator: Generator,
    validator: Option<SharedValidator>,
    config: PhaseConfig,
    runner_fut: Option<Pin<Box<dyn Future<Output = Vec<WorkerOutcome>> + Send>>>,
}

impl<T> Phase<T> {
    pub fn new<G>(name: &str, transport: Arc<T>, generator: G) -> Self
    where
        G: Fn(&mut SmallRng, usize) -> String + Send + Sync + 'static,
    {
        Self {
            transport,
            generator: Arc::new(generator),
            validator: None,
            config: PhaseConfig::new(name),
            runner_fut: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

impl<T> Future for Phase<T>
where
    T: Transport + Sync + 'static,
{
    type Output = Vec<WorkerOutcome>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let runner = this.runner_fut.get_or_insert_with(|| {
            Box::pin(run_phase(
                this.transport.clone(),
                this.generator.clone(),
                this.validator.clone(),
                this.config.clone(),
            ))
        });
        runner.as_mut().poll(cx)
    }
}

pub trait ConfigurablePhase: Future<Output = Vec<WorkerOutcome>> + Sized + Send {
    fn workers(self, workers: usize) -> Self;
    fn duration(self, duration: Duration) -> Self;
    fn mode(self, mode: ConnectionMode) -> Self;
    fn churn(self) -> Self;
    fn persistent(self) -> Self;
    fn validator<V>(self, validator: V) -> Self
    where
        V: Fn(&Value) -> Result<(), ValidationError> + Send + Sync + 'static;
    fn tps(self, tps: NonZeroU32) -> Self;
    fn call_timeout(self, timeout: Duration) -> Self;
    fn reservoir_capacity(self, capacity: usize) -> Self;
    fn config(self, config: PhaseConfig) -> Self;
}

impl<T> ConfigurablePhase for Phase<T>
where
    T: Transport + Sync + 'static,
{
    /// Number of concurrent workers.
    ///
    /// # Example
    /// ```no_run
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use surge::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let transport = Arc::new(TcpTransport::new("127.0.0.1:7878"));
    ///     Phase::new("Query", transport, |_rng, _id| "QUERY in:bench take:5".to_string())
    ///         .workers(64)
    ///         .duration(Duration::from_secs(30))
    ///         .await;
    /// }
    /// ```
    fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    fn duration(mut self, duration: Duration) -> Self {
        self.config.duration = duration;
        self
    }

    fn mode(mut self, mode: ConnectionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Open a fresh connection for every request and close it right after the
    /// reply. Connection failures caused by local port or descriptor
    /// exhaustion are counted as client limits rather than errors.
    ///
    /// # Example
    /// ```no_run
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use surge::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let transport = Arc::new(TcpTransport::new("127.0.0.1:7878"));
    ///     let workers = Phase::new("ConnStorm", transport, |_rng, _id| {
    ///         "QUERY in:bench where:(loc:aws-us-east) take:1".to_string()
    ///     })
    ///     .churn()
    ///     .duration(Duration::from_secs(10))
    ///     .await;
    ///
    ///     let limited: u64 = workers.iter().map(|w| w.client_limit_count).sum();
    ///     println!("client limits hit: {limited}");
    /// }
    /// ```
    fn churn(self) -> Self {
        self.mode(ConnectionMode::Churn)
    }

    fn persistent(self) -> Self {
        self.mode(ConnectionMode::Persistent)
    }

    /// Reject replies that fail `validator`. Rejections count as errors.
    fn validator<V>(mut self, validator: V) -> Self
    where
        V: Fn(&Value) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Cap the aggregate request rate of the phase.
    fn tps(mut self, tps: NonZeroU32) -> Self {
        self.config.max_tps = Some(tps);
        self
    }

    fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    fn reservoir_capacity(mut self, capacity: usize) -> Self {
        self.config.reservoir_capacity = capacity;
        self
    }

    /// Replace the whole configuration. The phase name is kept.
    fn config(mut self, config: PhaseConfig) -> Self {
        let name = std::mem::take(&mut self.config.name);
        self.config = PhaseConfig { name, ..config };
        self
    }
}

#[instrument(name="phase", skip_all, fields(name=config.name))]
pub(crate) async fn run_phase<T>(
    transport: Arc<T>,
    generator: Generator,
    validator: Option<SharedValidator>,
    config: PhaseConfig,
) -> Vec<WorkerOutcome>
where
    T: Transport + Sync + 'static,
{
    info!("Running {} with config {:?}", config.name, &config);
    let start = Instant::now();

    let stop = StopSignal::new();
    let shared = WorkerShared {
        transport,
        generator,
        validator,
        mode: config.mode,
        call_timeout: config.call_timeout,
        stop: stop.clone(),
        limiter: config.max_tps.map(|tps| Arc::new(rate_limiter(tps))),
        metrics: PhaseMetrics::new(&config.name),
    };

    let handles: Vec<_> = (0..config.workers)
        .map(|id| {
            let worker = Worker::new(id, shared.clone(), config.reservoir_capacity);
            tokio::spawn(worker.run().in_current_span())
        })
        .collect();
    debug!("Spawned {} {} workers", handles.len(), config.mode);

    tokio::time::sleep(config.duration).await;
    stop.stop();

    // NOTE: Workers finish their in-flight request before observing the stop.
    let mut outcomes = Vec::with_capacity(handles.len());
    for (id, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                error!("Worker {id} did not shut down cleanly: {err}");
                outcomes.push(WorkerOutcome::new(id, 0));
            }
        }
    }

    info!(
        "Phase {} complete in {}",
        config.name,
        humantime::format_duration(start.elapsed())
    );
    outcomes
}

fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}
