//! Command parsing for the line protocol.
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, PartialEq)]
pub enum Command {
    Event {
        ns: String,
        entity: String,
        tags: BTreeMap<String, Value>,
    },
    Query {
        ns: String,
        filters: Vec<(String, String)>,
        take: Option<usize>,
        cursor: Option<u64>,
    },
}

type Args<'a> = Vec<(&'a str, &'a str)>;

fn args(rest: &str) -> Result<Args<'_>, String> {
    rest.split_whitespace()
        .map(|token| {
            token
                .split_once(':')
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| format!("malformed argument `{token}`"))
        })
        .collect()
}

fn required(args: &Args<'_>, key: &str) -> Result<String, String> {
    args.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .ok_or_else(|| format!("missing `{key}:`"))
}

fn number<T: std::str::FromStr>(args: &Args<'_>, key: &str) -> Result<Option<T>, String> {
    args.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.parse().map_err(|_| format!("invalid `{key}:{v}`")))
        .transpose()
}

/// Integers are stored as numbers, everything else as text.
fn tag_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}

/// Splits `where:(k:v k2:v2)` out of a query line.
fn split_where(rest: &str) -> Result<(String, Vec<(String, String)>), String> {
    let Some(start) = rest.find("where:(") else {
        return Ok((rest.to_string(), vec![]));
    };
    let body_start = start + "where:(".len();
    let len = rest[body_start..]
        .find(')')
        .ok_or_else(|| "unterminated `where:(`".to_string())?;

    let filters = rest[body_start..body_start + len]
        .split_whitespace()
        .filter(|token| !token.eq_ignore_ascii_case("and"))
        .map(|token| {
            token
                .split_once(':')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| format!("malformed filter `{token}`"))
        })
        .collect::<Result<_, _>>()?;

    let remainder = format!("{} {}", &rest[..start], &rest[body_start + len + 1..]);
    Ok((remainder, filters))
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    match verb.to_ascii_uppercase().as_str() {
        "EVENT" => {
            let args = args(rest)?;
            let ns = required(&args, "in")?;
            let entity = required(&args, "entity")?;
            let tags = args
                .iter()
                .filter(|(k, _)| !matches!(*k, "in" | "entity"))
                .map(|(k, v)| (k.to_string(), tag_value(v)))
                .collect();
            Ok(Command::Event { ns, entity, tags })
        }
        "QUERY" => {
            let (rest, filters) = split_where(rest)?;
            let args = args(&rest)?;
            Ok(Command::Query {
                ns: required(&args, "in")?,
                filters,
                take: number(&args, "take")?,
                cursor: number(&args, "cursor")?,
            })
        }
        _ => Err(format!("unknown command `{verb}`")),
    }
}
