//! Command generators for the load and bench suites.
use rand::rngs::SmallRng;
use rand::Rng;
use surge::SettlingProbe;

pub const LOCATIONS: &[&str] = &["aws-us-east", "aws-us-west", "gcp-eu-west", "azure-asia"];

/// The bench suite spreads traffic over a fixed subset of locations.
pub const BENCH_LOCATIONS: &[&str] = &["aws-us-east", "aws-us-west", "gcp-eu-west"];

pub const EVENT_TYPES: &[&str] = &["click", "view", "purchase", "login", "logout"];

/// Number of tags attached to a complex payload.
pub const COMPLEX_TAGS: usize = 15;

/// Share of load-suite queries that target a location nothing was written to.
const MISS_RATIO: f64 = 0.05;

const HOT_USERS: u32 = 1_000;
const COLD_USERS: u32 = 999_000;

/// A namespace no earlier run has written to.
pub fn unique_namespace(prefix: &str) -> String {
    format!("test_{prefix}_{}", uuid::Uuid::new_v4().simple())
}

/// 80% of traffic goes to a hot set of a thousand users, the rest to a long
/// tail of almost a million.
pub fn realistic_user(rng: &mut SmallRng) -> String {
    if rng.gen_bool(0.8) {
        format!("user_{}", rng.gen_range(0..HOT_USERS))
    } else {
        format!("user_{}", HOT_USERS + rng.gen_range(0..COLD_USERS))
    }
}

fn pick<'a>(rng: &mut SmallRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

pub fn write_command(ns: &str, rng: &mut SmallRng, locations: &[&str]) -> String {
    let user = realistic_user(rng);
    let loc = pick(rng, locations);
    let kind = pick(rng, EVENT_TYPES);
    let session = rng.gen_range(0..99_999);
    format!("EVENT in:{ns} entity:{user} loc:{loc} type:{kind} meta:session_{session}")
}

/// Load-suite read: mostly location lookups, with a small share of misses.
pub fn read_command(ns: &str, rng: &mut SmallRng) -> String {
    if rng.gen_bool(MISS_RATIO) {
        return format!("QUERY in:{ns} where:(loc:non_existent_zone)");
    }
    let loc = pick(rng, LOCATIONS);
    format!("QUERY in:{ns} where:(loc:{loc}) take:5")
}

pub fn bench_read_command(ns: &str, rng: &mut SmallRng) -> String {
    let loc = pick(rng, BENCH_LOCATIONS);
    format!("QUERY in:{ns} where:(loc:{loc}) take:10")
}

pub fn complex_command(ns: &str, entity: &str, rng: &mut SmallRng) -> String {
    let mut cmd = format!("EVENT in:{ns} entity:{entity} type:heavy");
    for i in 0..COMPLEX_TAGS {
        cmd.push_str(&format!(" tag_{i}:val_{}_abcdefgh", rng.gen_range(0..100)));
    }
    cmd
}

pub fn conn_storm_command(ns: &str) -> String {
    format!("QUERY in:{ns} where:(loc:aws-us-east) take:1")
}

/// A probe that writes one tagged record into `ns` and queries for that tag.
pub fn settling_probe(ns: &str) -> SettlingProbe {
    let write_ns = ns.to_string();
    let query_ns = ns.to_string();
    SettlingProbe::new(
        move |marker| {
            format!("EVENT in:{write_ns} entity:{marker} loc:probe type:probe probe:{marker}")
        },
        move |marker| format!("QUERY in:{query_ns} where:(probe:{marker})"),
    )
}
