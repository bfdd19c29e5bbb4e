//! Standardized benchmark. Phase names carry a workload version so results
//! from different runs stay comparable.
use super::load::Recorder;
use crate::config::RunConfig;
use crate::error::SuiteError;
use crate::workload::{
    bench_read_command, complex_command, realistic_user, write_command, BENCH_LOCATIONS,
};
use surge::prelude::*;
use surge_core::BENCH_RESERVOIR_CAPACITY;

pub const INGEST: &str = "v1_100%_Ingest";
pub const QUERY: &str = "v1_100%_Query";
pub const MIXED: &str = "v1_50%_Mixed";
pub const COMPLEX: &str = "v1_Complex_Payload";

fn bench_phase<G>(rec: &Recorder<'_>, name: &str, generator: G) -> Phase<TcpTransport>
where
    G: Fn(&mut SmallRng, usize) -> String + Send + Sync + 'static,
{
    rec.phase(name, generator)
        .reservoir_capacity(BENCH_RESERVOIR_CAPACITY)
}

/// Runs every phase without a health gate, measuring settling time after each
/// phase that writes.
pub(super) async fn run(
    config: &RunConfig,
    results: &mut Vec<PhaseResult>,
) -> Result<(), SuiteError> {
    let mut rec = Recorder::new(config, "bench", results);

    let ns = rec.ns.clone();
    let workers = bench_phase(&rec, INGEST, move |rng, _| {
        write_command(&ns, rng, BENCH_LOCATIONS)
    })
    .validator(expect_ok)
    .await;
    let settling = rec.settle().await;
    rec.record(INGEST, workers, settling);

    let ns = rec.ns.clone();
    let workers = bench_phase(&rec, QUERY, move |rng, _| bench_read_command(&ns, rng)).await;
    rec.record(QUERY, workers, None);

    let ns = rec.ns.clone();
    let workers = bench_phase(&rec, MIXED, move |rng, _| {
        if rng.gen_bool(0.5) {
            write_command(&ns, rng, BENCH_LOCATIONS)
        } else {
            bench_read_command(&ns, rng)
        }
    })
    .await;
    let settling = rec.settle().await;
    rec.record(MIXED, workers, settling);

    let ns = rec.ns.clone();
    let workers = bench_phase(&rec, COMPLEX, move |rng, _| {
        let entity = realistic_user(rng);
        complex_command(&ns, &entity, rng)
    })
    .validator(expect_ok)
    .await;
    let settling = rec.settle().await;
    rec.record(COMPLEX, workers, settling);

    Ok(())
}
