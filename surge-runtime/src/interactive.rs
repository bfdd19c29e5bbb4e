//! Line-at-a-time shell against the service.
use crate::config::RunConfig;
use crate::error::RuntimeError;
use std::io::Write;
use surge::prelude::*;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const PROMPT: &str = "> ";

pub async fn run(config: &RunConfig) -> Result<(), RuntimeError> {
    let transport = config.transport();
    let mut conn = transport
        .connect()
        .await
        .map_err(|source| RuntimeError::Connect {
            addr: config.addr.clone(),
            source,
        })?;

    println!("Connected to {}. Type `exit` to quit.", config.addr);
    let stdin = BufReader::new(tokio::io::stdin());
    let res = repl(&mut conn, stdin, std::io::stdout()).await;
    conn.close().await;
    res
}

/// Reads commands from `input` until EOF or `exit`/`quit`, writing each decoded
/// reply to `out` as pretty JSON. A transport failure ends the session.
pub async fn repl<C, R, W>(conn: &mut C, input: R, mut out: W) -> Result<(), RuntimeError>
where
    C: Connection,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command.eq_ignore_ascii_case("exit") || command.eq_ignore_ascii_case("quit") {
            break;
        }

        if let Err(err) = conn.send(command).await {
            writeln!(out, "Send error: {err}")?;
            break;
        }
        match conn.receive().await {
            Ok(reply) => writeln!(out, "{}", pretty(&reply))?,
            Err(err) => {
                writeln!(out, "Read error: {err}")?;
                break;
            }
        }
    }
    Ok(())
}

pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
