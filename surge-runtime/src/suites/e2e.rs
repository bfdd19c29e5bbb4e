use crate::config::RunConfig;
use crate::conformance::{run_test_cases, Step, TestCase};
use crate::error::SuiteError;
use crate::workload::unique_namespace;
use std::time::Duration;
use surge::prelude::*;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Runs the cases on one connection in a fresh namespace.
pub(super) async fn run(
    config: &RunConfig,
    prefix: &str,
    cases: fn(&str) -> Vec<TestCase>,
) -> Result<(), SuiteError> {
    let ns = unique_namespace(prefix);
    debug!("Using namespace {ns}");

    let transport = config.transport();
    let mut conn = transport.connect().await.map_err(SuiteError::Connect)?;
    let res = run_test_cases(&mut conn, &cases(&ns)).await;
    conn.close().await;
    res
}

pub fn ingest_cases(ns: &str) -> Vec<TestCase> {
    vec![TestCase::new(
        "Basic Ingestion",
        vec![
            Step::new(format!("EVENT in:{ns} entity:u1 loc:us type:login")).expect(expect_ok),
            Step::new(format!("EVENT in:{ns} entity:u2 loc:eu type:logout")).expect(expect_ok),
        ],
    )]
}

pub fn query_cases(ns: &str) -> Vec<TestCase> {
    vec![
        TestCase::new(
            "Query with Filtering",
            vec![
                Step::new(format!("EVENT in:{ns} entity:u1 loc:ca type:login")).expect(expect_ok),
                Step::new(format!("EVENT in:{ns} entity:u2 loc:ny type:login")).expect(expect_ok),
                Step::pause(Duration::from_millis(250)),
                Step::new(format!("QUERY in:{ns} where:(loc:ca)"))
                    .expect(expect_count(1))
                    .retries(10, RETRY_DELAY),
                Step::new(format!("QUERY in:{ns} where:(loc:ca)")).expect(expect_entity("u1")),
            ],
        ),
        TestCase::new(
            "Query No Match",
            vec![Step::new(format!("QUERY in:{ns} where:(loc:texas)"))
                .expect(expect_count(0))
                .retries(5, RETRY_DELAY)],
        ),
    ]
}

pub fn pagination_cases(ns: &str) -> Vec<TestCase> {
    let query = format!("QUERY in:{ns} where:(loc:ca)");
    vec![TestCase::new(
        "Pagination",
        vec![
            Step::new(format!("EVENT in:{ns} entity:A eid:10 loc:ca")).expect(expect_ok),
            Step::new(format!("EVENT in:{ns} entity:B eid:20 loc:ca")).expect(expect_ok),
            Step::new(format!("EVENT in:{ns} entity:C eid:30 loc:ca")).expect(expect_ok),
            Step::pause(Duration::from_millis(50)),
            Step::new(query.clone())
                .expect(expect_count(3))
                .retries(10, RETRY_DELAY),
            Step::new(format!("{query} take:2")).expect(expect_count(2)),
            Step::new(format!("{query} take:3")).expect(expect_count(3)),
            Step::new(format!("{query} take:2")).expect(expect_next_cursor("3")),
            Step::new(format!("{query} cursor:3")).expect(expect_count(1)),
        ],
    )]
}

pub fn robustness_cases(ns: &str) -> Vec<TestCase> {
    vec![
        TestCase::new(
            "Invalid Commands",
            vec![
                Step::new("GARBAGE_COMMAND args:none").expect(expect_error),
                Step::new("EVENT missing_args").expect(expect_error),
            ],
        ),
        TestCase::new(
            "Server Alive Check",
            vec![Step::new(format!("EVENT in:{ns} entity:alive type:check")).expect(expect_ok)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_case_is_scoped_to_its_namespace() {
        let ns = "test_query_abc";
        for case in query_cases(ns).iter().chain(&pagination_cases(ns)) {
            for step in &case.steps {
                assert!(
                    step.command.starts_with("SLEEP") || step.command.contains("in:test_query_abc"),
                    "{}",
                    step.command
                );
            }
        }
    }

    #[test]
    fn visibility_steps_retry() {
        let cases = query_cases("ns");
        let polls: Vec<_> = cases
            .iter()
            .flat_map(|c| &c.steps)
            .filter(|s| s.max_retries > 0)
            .map(|s| s.max_retries)
            .collect();
        assert_eq!(polls, [10, 5]);
    }

    #[test]
    fn robustness_ends_with_a_liveness_check() {
        let cases = robustness_cases("ns");
        let last = cases.last().unwrap().steps.last().unwrap();
        assert_eq!(last.command, "EVENT in:ns entity:alive type:check");
    }
}
