//! Scripted request/validate steps for the functional suites.
use crate::error::{StepError, SuiteError};
use std::sync::Arc;
use std::time::Duration;
use surge::transport::Connection;
use surge::ValidationError;
use surge_core::Value;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

pub type StepValidator = Arc<dyn Fn(&Value) -> Result<(), ValidationError> + Send + Sync>;

const SLEEP_COMMAND: &str = "SLEEP";

/// One command of a test case, with optional validation and retries.
#[derive(Clone)]
pub struct Step {
    pub command: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub validator: Option<StepValidator>,
    /// Pause before the step runs.
    pub sleep: Duration,
}

impl Step {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            max_retries: 0,
            retry_delay: Duration::ZERO,
            validator: None,
            sleep: Duration::ZERO,
        }
    }

    /// A step that only waits.
    pub fn pause(duration: Duration) -> Self {
        Self::new(format!(
            "{SLEEP_COMMAND} {}",
            humantime::format_duration(duration)
        ))
    }

    pub fn expect<V>(mut self, validator: V) -> Self
    where
        V: Fn(&Value) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// `Some` when this step only sleeps. A bare `SLEEP` waits for nothing
    /// beyond the pre-sleep.
    fn sleep_only(&self) -> Option<Result<Duration, StepError>> {
        let rest = self.command.trim().strip_prefix(SLEEP_COMMAND)?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim();
        if rest.is_empty() {
            return Some(Ok(Duration::ZERO));
        }
        Some(
            humantime::parse_duration(rest).map_err(|source| StepError::Sleep {
                input: rest.to_string(),
                source,
            }),
        )
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("command", &self.command)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("validated", &self.validator.is_some())
            .field("sleep", &self.sleep)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct TestCase {
    pub name: String,
    pub steps: Vec<Step>,
}

impl TestCase {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            steps,
        }
    }
}

/// Runs `cases` in order on one connection, stopping at the first failing
/// step. Steps are numbered from 1 in the reported error.
pub async fn run_test_cases<C: Connection>(
    conn: &mut C,
    cases: &[TestCase],
) -> Result<(), SuiteError> {
    for case in cases {
        info!("Running test case '{}'", case.name);
        for (idx, step) in case.steps.iter().enumerate() {
            run_step(conn, step)
                .await
                .map_err(|source| SuiteError::Step {
                    name: case.name.clone(),
                    step: idx + 1,
                    source,
                })?;
        }
    }
    Ok(())
}

#[instrument(skip_all, fields(command = %step.command))]
async fn run_step<C: Connection>(conn: &mut C, step: &Step) -> Result<(), StepError> {
    if !step.sleep.is_zero() {
        tokio::time::sleep(step.sleep).await;
    }
    if let Some(pause) = step.sleep_only() {
        tokio::time::sleep(pause?).await;
        return Ok(());
    }

    let mut last_err = None;
    for attempt in 0..=step.max_retries {
        if attempt > 0 {
            tokio::time::sleep(step.retry_delay).await;
        }

        conn.send(&step.command).await.map_err(StepError::Send)?;
        let reply = conn.receive().await.map_err(StepError::Read)?;

        let Some(validator) = &step.validator else {
            return Ok(());
        };
        match validator(&reply) {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!("Attempt {} rejected: {err}", attempt + 1);
                last_err = Some(err);
            }
        }
    }

    match last_err {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use surge::prelude::{expect_count, expect_ok};
    use surge::TransportError;
    use tokio::time::Instant;

    fn ok() -> Value {
        [("status".to_string(), "OK")].into_iter().collect()
    }

    fn objects(n: usize) -> Value {
        let data = Value::Map(
            [("objects".to_string(), Value::List(vec![ok(); n]))]
                .into_iter()
                .collect(),
        );
        Value::Map(
            [
                ("status".to_string(), Value::from("OK")),
                ("data".to_string(), data),
            ]
            .into_iter()
            .collect(),
        )
    }

    /// Replays canned replies; `None` fails the receive.
    struct Replay {
        replies: VecDeque<Option<Value>>,
        sent: Vec<String>,
    }

    impl Replay {
        fn new(replies: Vec<Option<Value>>) -> Self {
            Self {
                replies: replies.into(),
                sent: vec![],
            }
        }
    }

    impl Connection for Replay {
        async fn send(&mut self, command: &str) -> Result<(), TransportError> {
            self.sent.push(command.to_string());
            Ok(())
        }

        async fn receive(&mut self) -> Result<Value, TransportError> {
            self.replies
                .pop_front()
                .flatten()
                .ok_or(TransportError::Closed)
        }

        async fn close(&mut self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_the_validator_passes() {
        let mut conn = Replay::new(vec![Some(objects(0)), Some(objects(0)), Some(objects(1))]);
        let case = TestCase::new(
            "Query",
            vec![Step::new("QUERY in:t where:(loc:ca)")
                .expect(expect_count(1))
                .retries(2, Duration::from_millis(100))],
        );

        let start = Instant::now();
        run_test_cases(&mut conn, &[case]).await.unwrap();
        let elapsed = start.elapsed();
        assert_eq!(conn.sent.len(), 3);
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(210), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_the_last_rejection() {
        let mut conn = Replay::new(vec![Some(objects(0)), Some(objects(2))]);
        let case = TestCase::new(
            "Query",
            vec![
                Step::new("EVENT in:t entity:u1").expect(|_: &Value| Ok(())),
                Step::new("QUERY in:t").expect(expect_count(1)).retries(0, Duration::ZERO),
            ],
        );

        let err = run_test_cases(&mut conn, &[case]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "test 'Query' failed: step 2 failed: expected 1 objects, got 2"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_is_not_retried() {
        let mut conn = Replay::new(vec![None, Some(ok())]);
        let case = TestCase::new(
            "Ingest",
            vec![Step::new("EVENT in:t entity:u1")
                .expect(expect_ok)
                .retries(5, Duration::from_millis(10))],
        );

        let err = run_test_cases(&mut conn, &[case]).await.unwrap_err();
        assert!(matches!(
            err,
            SuiteError::Step {
                step: 1,
                source: StepError::Read(_),
                ..
            }
        ));
        assert_eq!(conn.sent.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_steps_do_not_touch_the_connection() {
        let mut conn = Replay::new(vec![]);
        let case = TestCase::new(
            "Pause",
            vec![
                Step::new("SLEEP 250ms"),
                Step::pause(Duration::from_millis(50)),
                Step::new("SLEEP").sleep(Duration::from_millis(10)),
            ],
        );

        let start = Instant::now();
        run_test_cases(&mut conn, &[case]).await.unwrap();
        let elapsed = start.elapsed();
        assert!(conn.sent.is_empty());
        assert!(elapsed >= Duration::from_millis(310), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(320), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_sleep_fails_the_step() {
        let mut conn = Replay::new(vec![]);
        let case = TestCase::new("Pause", vec![Step::new("SLEEP soon")]);

        let err = run_test_cases(&mut conn, &[case]).await.unwrap_err();
        assert!(matches!(
            err,
            SuiteError::Step {
                source: StepError::Sleep { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn sleepy_prefixes_are_sent_as_commands() {
        let mut conn = Replay::new(vec![Some(ok())]);
        let case = TestCase::new("Unknown", vec![Step::new("SLEEPY in:t")]);

        run_test_cases(&mut conn, &[case]).await.unwrap();
        assert_eq!(conn.sent, vec!["SLEEPY in:t"]);
    }
}
