//! Index settling-time measurement.
//!
//! After a write-heavy phase a single tagged record is written, then the
//! service is polled with a query that matches only that record until it shows
//! up. The elapsed time since the write was acknowledged is the settling time.
use crate::error::{SettleError, TransportError};
use crate::transport::{deadline, Connection, Transport};
use crate::validate::expect_ok;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use surge_core::{
    extract_objects, Value, DEFAULT_CALL_TIMEOUT, SETTLE_MAX_ATTEMPTS, SETTLE_POLL_INTERVAL,
};
use tokio::time::{interval, Instant, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

type CommandFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

static PROBE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Returns a marker no other probe in this process (or a recent run) uses.
pub fn probe_marker() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = PROBE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("probe_{nanos}_{seq}")
}

#[derive(Clone)]
pub struct SettlingProbe {
    write: CommandFn,
    query: CommandFn,
    interval: Duration,
    max_attempts: u32,
    call_timeout: Duration,
}

impl SettlingProbe {
    /// `write` builds the tagged write for a marker, `query` a query matching
    /// only records carrying that marker.
    pub fn new<W, Q>(write: W, query: Q) -> Self
    where
        W: Fn(&str) -> String + Send + Sync + 'static,
        Q: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            write: Arc::new(write),
            query: Arc::new(query),
            interval: SETTLE_POLL_INTERVAL,
            max_attempts: SETTLE_MAX_ATTEMPTS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[instrument(name = "settle", skip_all)]
    pub async fn measure<T>(&self, transport: &T) -> Result<Duration, SettleError>
    where
        T: Transport + Sync,
    {
        let marker = probe_marker();
        let mut conn = deadline("connect", self.call_timeout, transport.connect()).await?;

        let ack = match self.exchange(&mut conn, &(self.write)(&marker)).await {
            Ok(ack) => ack,
            Err(err) => {
                conn.close().await;
                return Err(err.into());
            }
        };
        if let Err(err) = expect_ok(&ack) {
            conn.close().await;
            return Err(err.into());
        }
        let acked = Instant::now();
        debug!("Probe {marker} acknowledged");

        let query = (self.query)(&marker);
        let mut conn = Some(conn);
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for attempt in 1..=self.max_attempts {
            // NOTE: First tick completes instantly
            ticker.tick().await;

            if conn.is_none() {
                match deadline("connect", self.call_timeout, transport.connect()).await {
                    Ok(fresh) => conn = Some(fresh),
                    Err(err) => {
                        debug!("Probe reconnect failed: {err}");
                        continue;
                    }
                }
            }
            let Some(active) = conn.as_mut() else {
                continue;
            };

            match self.exchange(active, &query).await {
                Ok(reply) if is_visible(&reply) => {
                    let settled = acked.elapsed();
                    if let Some(mut conn) = conn.take() {
                        conn.close().await;
                    }
                    info!(
                        "Probe visible after {} ({attempt} polls)",
                        humantime::format_duration(settled)
                    );
                    return Ok(settled);
                }
                Ok(_) => {}
                Err(err) => {
                    debug!("Probe poll failed: {err}");
                    if let Some(mut broken) = conn.take() {
                        broken.close().await;
                    }
                }
            }
        }

        if let Some(mut conn) = conn {
            conn.close().await;
        }
        Err(SettleError::Timeout {
            attempts: self.max_attempts,
        })
    }

    async fn exchange<C: Connection>(
        &self,
        conn: &mut C,
        command: &str,
    ) -> Result<Value, TransportError> {
        deadline("send", self.call_timeout, conn.send(command)).await?;
        deadline("receive", self.call_timeout, conn.receive()).await
    }
}

fn is_visible(reply: &Value) -> bool {
    extract_objects(reply).is_ok_and(|objects| !objects.is_empty())
}
