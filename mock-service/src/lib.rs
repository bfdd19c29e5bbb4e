//! In-process mock of a line-protocol event store.
//!
//! Accepts newline-terminated `EVENT` and `QUERY` commands over TCP and answers
//! each with one MessagePack-encoded map. Writes become visible to queries
//! after a configurable index lag.
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::Rng;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

mod protocol;

pub use protocol::{parse, Command};

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    /// Delay between a write being acknowledged and it showing up in queries.
    pub index_lag: Duration,
    /// Share of requests answered with an injected error.
    pub error_rate: f64,
    /// Delay before each reply.
    pub reply_delay: Duration,
    /// Requests beyond this rate are rejected as overloaded.
    pub max_tps: Option<NonZeroU32>,
}

struct Event {
    id: u64,
    entity: String,
    tags: BTreeMap<String, Value>,
    visible_at: Instant,
}

impl Event {
    fn matches(&self, filters: &[(String, String)]) -> bool {
        filters.iter().all(|(key, expected)| {
            let actual = match key.as_str() {
                "entity" => Some(self.entity.clone()),
                _ => self.tags.get(key).map(render),
            };
            actual.as_deref() == Some(expected.as_str())
        })
    }

    fn to_object(&self) -> Value {
        let mut object: Map<String, Value> = self
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        object.insert("id".to_string(), json!(self.id));
        object.insert("entity".to_string(), json!(self.entity));
        Value::Object(object)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Default)]
struct Namespace {
    next_id: u64,
    events: Vec<Event>,
}

pub struct MockService {
    config: MockConfig,
    namespaces: Mutex<HashMap<String, Namespace>>,
    limiter: Option<DefaultDirectRateLimiter>,
    requests: AtomicU64,
}

impl MockService {
    pub fn new(config: MockConfig) -> Self {
        Self {
            limiter: config.max_tps.map(|tps| RateLimiter::direct(Quota::per_second(tps))),
            config,
            namespaces: Mutex::new(HashMap::new()),
            requests: AtomicU64::new(0),
        }
    }

    /// Commands handled so far, including rejected ones.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn handle(&self, line: &str) -> Value {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("mock_service_requests").increment(1);

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                return error_reply("overloaded");
            }
        }
        if self.config.error_rate > 0. && rand::thread_rng().gen_bool(self.config.error_rate.min(1.)) {
            return error_reply("injected failure");
        }

        match parse(line) {
            Ok(Command::Event { ns, entity, tags }) => self.insert(ns, entity, tags),
            Ok(Command::Query {
                ns,
                filters,
                take,
                cursor,
            }) => self.query(&ns, &filters, take, cursor),
            Err(message) => {
                debug!("Rejected `{line}`: {message}");
                error_reply(&message)
            }
        }
    }

    fn insert(&self, ns: String, entity: String, tags: BTreeMap<String, Value>) -> Value {
        let mut namespaces = self.namespaces.lock().unwrap_or_else(PoisonError::into_inner);
        let namespace = namespaces.entry(ns).or_default();
        namespace.next_id += 1;
        namespace.events.push(Event {
            id: namespace.next_id,
            entity,
            tags,
            visible_at: Instant::now() + self.config.index_lag,
        });
        json!({ "status": "OK" })
    }

    /// Matches are ordered by id. `next_cursor` is the id of the first match
    /// left out by `take`, or nil when none was.
    fn query(
        &self,
        ns: &str,
        filters: &[(String, String)],
        take: Option<usize>,
        cursor: Option<u64>,
    ) -> Value {
        let now = Instant::now();
        let namespaces = self.namespaces.lock().unwrap_or_else(PoisonError::into_inner);
        let mut matches = namespaces
            .get(ns)
            .into_iter()
            .flat_map(|namespace| namespace.events.iter())
            .filter(|event| event.visible_at <= now)
            .filter(|event| cursor.map_or(true, |cursor| event.id >= cursor))
            .filter(|event| event.matches(filters));

        let limit = take.unwrap_or(usize::MAX);
        let objects: Vec<Value> = matches.by_ref().take(limit).map(Event::to_object).collect();
        let next_cursor = matches.next().map_or(Value::Null, |event| json!(event.id));

        json!({
            "status": "OK",
            "data": { "objects": objects, "next_cursor": next_cursor },
        })
    }
}

fn error_reply(message: &str) -> Value {
    json!({ "status": "ERROR", "message": message })
}

async fn handle_connection(socket: TcpStream, service: Arc<MockService>) -> io::Result<()> {
    let (read, mut write) = socket.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !service.config.reply_delay.is_zero() {
            tokio::time::sleep(service.config.reply_delay).await;
        }

        let reply = service.handle(line);
        let bytes = rmp_serde::to_vec_named(&reply).map_err(io::Error::other)?;
        write.write_all(&bytes).await?;
    }
    Ok(())
}

/// Accepts connections until the listener fails.
pub async fn serve(listener: TcpListener, service: Arc<MockService>) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!("Accept failed: {err}");
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };
        let _ = socket.set_nodelay(true);

        let service = service.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, service).await {
                debug!("Connection from {peer} ended: {err}");
            }
        });
    }
}

/// Starts a mock on an ephemeral local port in the current runtime.
pub async fn spawn(config: MockConfig) -> io::Result<(SocketAddr, Arc<MockService>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let service = Arc::new(MockService::new(config));
    tokio::spawn(serve(listener, service.clone()));
    Ok((addr, service))
}

pub async fn run(addr: SocketAddr, config: MockConfig) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Mock event store listening on {addr}");
    let service = Arc::new(MockService::new(config));
    tokio::spawn(tps_measure_task(service.clone()));
    serve(listener, service).await;
    Ok(())
}

/** TPS Printer **/

pub async fn tps_measure_task(service: Arc<MockService>) {
    let mut last = service.requests();
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let total = service.requests();
        info!("{} TPS", total - last);
        last = total;
    }
}
