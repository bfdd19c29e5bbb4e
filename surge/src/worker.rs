//! A single simulated client.
use crate::error::{TransportError, ValidationError};
use crate::metrics::PhaseMetrics;
use crate::signal::StopSignal;
use crate::transport::{deadline, Connection, Transport};
use governor::DefaultDirectRateLimiter;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use surge_core::{ConnectionMode, Value, WorkerOutcome};
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Produces the next command for a worker from its private random source and
/// its id.
pub type Generator = Arc<dyn Fn(&mut SmallRng, usize) -> String + Send + Sync>;

/// Judges a decoded reply. A rejected reply counts as an error.
pub type SharedValidator = Arc<dyn Fn(&Value) -> Result<(), ValidationError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    Idle,
    Running,
    Stopped,
}

/// Everything the workers of one phase have in common.
pub(crate) struct WorkerShared<T> {
    pub transport: Arc<T>,
    pub generator: Generator,
    pub validator: Option<SharedValidator>,
    pub mode: ConnectionMode,
    pub call_timeout: Duration,
    pub stop: StopSignal,
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub metrics: PhaseMetrics,
}

impl<T> Clone for WorkerShared<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            generator: self.generator.clone(),
            validator: self.validator.clone(),
            mode: self.mode,
            call_timeout: self.call_timeout,
            stop: self.stop.clone(),
            limiter: self.limiter.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

pub(crate) struct Worker<T> {
    shared: WorkerShared<T>,
    outcome: WorkerOutcome,
    rng: SmallRng,
    state: WorkerState,
}

impl<T> Worker<T>
where
    T: Transport + Sync + 'static,
{
    pub fn new(id: usize, shared: WorkerShared<T>, reservoir_capacity: usize) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        Self {
            shared,
            outcome: WorkerOutcome::new(id, reservoir_capacity),
            rng: SmallRng::seed_from_u64(nanos.wrapping_add(id as u64)),
            state: WorkerState::Idle,
        }
    }

    pub fn id(&self) -> usize {
        self.outcome.id
    }

    /// Runs until the stop signal is observed and hands back the outcome.
    #[instrument(name = "worker", skip_all, fields(id = self.outcome.id))]
    pub async fn run(mut self) -> WorkerOutcome {
        self.transition(WorkerState::Running);
        match self.shared.mode {
            ConnectionMode::Persistent => self.run_persistent().await,
            ConnectionMode::Churn => self.run_churn().await,
        }
        self.transition(WorkerState::Stopped);
        self.outcome
    }

    async fn run_persistent(&mut self) {
        let mut conn = match self.connect().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn!("Worker {} init failed: {err}", self.id());
                self.record_error();
                return;
            }
        };

        let id = self.id();
        while !self.shared.stop.is_stopped() {
            if !self.throttle().await {
                break;
            }
            let command = (self.shared.generator)(&mut self.rng, id);

            if conn.is_none() {
                match self.connect().await {
                    Ok(fresh) => conn = Some(fresh),
                    Err(err) => {
                        debug!("Reconnect failed: {err}");
                        self.record_error();
                        tokio::task::yield_now().await;
                        continue;
                    }
                }
            }
            let Some(active) = conn.as_mut() else {
                continue;
            };

            let start = Instant::now();
            match self.exchange(active, &command).await {
                Ok(reply) => {
                    if !self.complete(start.elapsed(), &reply) {
                        tokio::task::yield_now().await;
                    }
                }
                Err(err) => {
                    trace!("Request failed: {err}");
                    self.record_error();
                    // The stream may still carry a late reply; start over on a
                    // fresh connection.
                    if let Some(mut broken) = conn.take() {
                        broken.close().await;
                    }
                    tokio::task::yield_now().await;
                }
            }
        }

        if let Some(mut conn) = conn {
            conn.close().await;
        }
    }

    async fn run_churn(&mut self) {
        let id = self.id();
        while !self.shared.stop.is_stopped() {
            if !self.throttle().await {
                break;
            }
            let command = (self.shared.generator)(&mut self.rng, id);

            let start = Instant::now();
            let mut conn = match self.connect().await {
                Ok(conn) => conn,
                Err(err) => {
                    if err.is_client_limit() {
                        trace!("Client resource limit: {err}");
                        self.outcome.client_limit_count += 1;
                        self.shared.metrics.client_limit();
                    } else {
                        trace!("Connect failed: {err}");
                        self.record_error();
                    }
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            let res = self.exchange(&mut conn, &command).await;
            let latency = start.elapsed();
            conn.close().await;

            let ok = match res {
                Ok(reply) => self.complete(latency, &reply),
                Err(err) => {
                    trace!("Request failed: {err}");
                    self.record_error();
                    false
                }
            };
            if !ok {
                tokio::task::yield_now().await;
            }
        }
    }

    async fn connect(&self) -> Result<T::Conn, TransportError> {
        deadline(
            "connect",
            self.shared.call_timeout,
            self.shared.transport.connect(),
        )
        .await
    }

    async fn exchange(&self, conn: &mut T::Conn, command: &str) -> Result<Value, TransportError> {
        let limit = self.shared.call_timeout;
        deadline("send", limit, conn.send(command)).await?;
        deadline("receive", limit, conn.receive()).await
    }

    /// Validates a reply and records it. Returns whether it counted as a
    /// success.
    fn complete(&mut self, latency: Duration, reply: &Value) -> bool {
        if let Some(validator) = &self.shared.validator {
            if let Err(err) = validator(reply) {
                trace!("Validation failed: {err}");
                self.record_error();
                return false;
            }
        }

        self.outcome.success_count += 1;
        self.outcome.latencies.record(latency, &mut self.rng);
        self.shared.metrics.success(latency);
        true
    }

    fn record_error(&mut self) {
        self.outcome.error_count += 1;
        self.shared.metrics.error();
    }

    /// Waits for a slot under the TPS cap. Returns `false` when the phase
    /// stopped first, in which case nothing may be sent.
    async fn throttle(&self) -> bool {
        let Some(limiter) = &self.shared.limiter else {
            return true;
        };
        tokio::select! {
            _ = limiter.until_ready() => !self.shared.stop.is_stopped(),
            _ = self.shared.stop.stopped() => false,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug_assert!(matches!(
            (self.state, next),
            (WorkerState::Idle, WorkerState::Running) | (WorkerState::Running, WorkerState::Stopped)
        ));
        trace!("Worker {} {:?} -> {:?}", self.id(), self.state, next);
        self.state = next;
    }
}
