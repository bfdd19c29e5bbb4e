use crate::config::RunConfig;
use crate::error::SuiteError;
use crate::workload::{
    complex_command, conn_storm_command, read_command, settling_probe, unique_namespace,
    write_command, LOCATIONS,
};
use std::sync::Arc;
use std::time::Duration;
use surge::prelude::*;
use surge::HealthError;
use surge_core::DEFAULT_RESERVOIR_CAPACITY;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Runs settling probes and files phase results for one suite run.
pub(super) struct Recorder<'a> {
    pub config: &'a RunConfig,
    pub transport: Arc<TcpTransport>,
    pub ns: String,
    pub results: &'a mut Vec<PhaseResult>,
}

impl<'a> Recorder<'a> {
    pub fn new(config: &'a RunConfig, prefix: &str, results: &'a mut Vec<PhaseResult>) -> Self {
        let ns = unique_namespace(prefix);
        info!("Using namespace {ns}");
        Self {
            config,
            transport: config.transport(),
            ns,
            results,
        }
    }

    /// A failed probe is logged and leaves the phase without a settling time.
    pub async fn settle(&self) -> Option<Duration> {
        let probe = settling_probe(&self.ns).call_timeout(self.config.call_timeout);
        match probe.measure(self.transport.as_ref()).await {
            Ok(settled) => Some(settled),
            Err(err) => {
                warn!("Settling time unavailable: {err}");
                None
            }
        }
    }

    pub fn record(&mut self, name: &str, workers: Vec<WorkerOutcome>, settling: Option<Duration>) {
        let result = summarize(name, workers, self.config.duration, settling);
        info!("{name}: {}", result.aggregate);
        self.results.push(result);
    }

    /// Health-gates the phase, then records it. An unhealthy phase is recorded
    /// without probing.
    pub async fn gate(
        &mut self,
        name: &str,
        workers: Vec<WorkerOutcome>,
        settle: bool,
    ) -> Result<(), SuiteError> {
        if let Err(err) = check_health(name, &workers, false) {
            self.record(name, workers, None);
            return Err(err.into());
        }
        let settling = if settle { self.settle().await } else { None };
        self.record(name, workers, settling);
        Ok(())
    }

    pub fn phase<G>(&self, name: &str, generator: G) -> Phase<TcpTransport>
    where
        G: Fn(&mut SmallRng, usize) -> String + Send + Sync + 'static,
    {
        let config = self.config.phase(name, DEFAULT_RESERVOIR_CAPACITY);
        Phase::new(name, self.transport.clone(), generator).config(config)
    }
}

pub(super) async fn run(
    config: &RunConfig,
    results: &mut Vec<PhaseResult>,
) -> Result<(), SuiteError> {
    let mut rec = Recorder::new(config, "load", results);

    let ns = rec.ns.clone();
    let workers = rec
        .phase("Ingest", move |rng, _| write_command(&ns, rng, LOCATIONS))
        .validator(expect_ok)
        .await;
    rec.gate("Ingest", workers, true).await?;

    let ns = rec.ns.clone();
    let workers = rec
        .phase("Query", move |rng, _| read_command(&ns, rng))
        .validator(expect_objects)
        .await;
    rec.gate("Query", workers, false).await?;

    let ns = rec.ns.clone();
    let workers = rec
        .phase("Mixed", move |rng, _| {
            if rng.gen_bool(0.5) {
                write_command(&ns, rng, LOCATIONS)
            } else {
                read_command(&ns, rng)
            }
        })
        .await;
    rec.gate("Mixed", workers, false).await?;

    let ns = rec.ns.clone();
    let workers = rec
        .phase("Complex", move |rng, _| {
            let entity = format!("complex_{}", rng.gen_range(0..1000));
            complex_command(&ns, &entity, rng)
        })
        .validator(expect_ok)
        .await;
    rec.gate("Complex", workers, false).await?;

    let storm = conn_storm_command(&rec.ns);
    let workers = rec
        .phase("ConnStorm", move |_, _| storm.clone())
        .churn()
        .await;
    conn_storm_health(&workers)?;
    rec.record("ConnStorm", workers, None);

    Ok(())
}

/// Connection storms routinely exhaust the client's own ports, so only a storm
/// with no successes at all fails the suite.
fn conn_storm_health(workers: &[WorkerOutcome]) -> Result<(), HealthError> {
    let limited: u64 = workers.iter().map(|w| w.client_limit_count).sum();
    if limited > 0 {
        warn!("Client exhausted local ports {limited} times");
    }

    match check_health("ConnStorm", workers, true) {
        Err(err @ HealthError::NoSuccesses { .. }) => Err(err),
        Err(err) => {
            warn!("NOTE: {err}");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
