//! Text and JSON reports of completed phases.
use crate::config::RunConfig;
use crate::error::RuntimeError;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use surge_core::{LatencyStats, PhaseResult};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const RULE: &str = "==========================================================";

pub fn fmt_duration(d: Duration) -> String {
    if d >= Duration::from_secs(1) {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        format!("{:.3}ms", d.as_secs_f64() * 1e3)
    }
}

/// Columns are right-aligned and separated by `|`.
struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: vec![],
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        debug_assert_eq!(cells.len(), self.headers.len());
        self.rows.push(cells);
    }

    fn write_line<'a>(
        f: &mut fmt::Formatter<'_>,
        cells: impl Iterator<Item = &'a str>,
        widths: &[usize],
    ) -> fmt::Result {
        for (i, (cell, &width)) in cells.zip(widths).enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{cell:>width$}")?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        Self::write_line(f, self.headers.iter().copied(), &widths)?;
        for row in &self.rows {
            Self::write_line(f, row.iter().map(String::as_str), &widths)?;
        }
        Ok(())
    }
}

fn latency_cells(latency: &LatencyStats, with_p99: bool) -> Vec<String> {
    let mut cells = vec![
        fmt_duration(latency.p50),
        fmt_duration(latency.p90),
        fmt_duration(latency.p95),
    ];
    if with_p99 {
        cells.push(fmt_duration(latency.p99));
    }
    cells.push(fmt_duration(latency.max));
    cells
}

struct TextReport<'a> {
    config: &'a RunConfig,
    results: &'a [PhaseResult],
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config;
        writeln!(f, "\n{RULE}")?;
        writeln!(f, "BENCHMARK REPORT")?;
        writeln!(
            f,
            "Config: {} workers | {} per phase | {}",
            config.workers,
            humantime::format_duration(config.duration),
            config.addr
        )?;
        writeln!(f, "{RULE}\n")?;

        writeln!(f, "TRAFFIC SUMMARY")?;
        let mut traffic = Table::new(&["PHASE", "OK", "RPS", "SVR ERR", "CLI LIM", "LAG"]);
        for result in self.results {
            let agg = &result.aggregate;
            traffic.row(vec![
                result.name.clone(),
                agg.total_ok.to_string(),
                format!("{:.1}", agg.total_rps),
                agg.total_err.to_string(),
                agg.total_client_limit.to_string(),
                result
                    .settling_time
                    .map(fmt_duration)
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }
        write!(f, "{traffic}")?;

        writeln!(f, "\nLATENCY STATS")?;
        let mut latency = Table::new(&["PHASE", "P50", "P90", "P95", "P99", "MAX"]);
        for result in self.results {
            let mut cells = vec![result.name.clone()];
            cells.extend(latency_cells(&result.aggregate.latency, true));
            latency.row(cells);
        }
        write!(f, "{latency}")?;

        writeln!(f, "\nDETAILED WORKER BREAKDOWN")?;
        for result in self.results {
            writeln!(f, "\n[{}]", result.name)?;
            let mut workers = Table::new(&["ID", "OK", "P50", "P90", "P95", "MAX", "ERRS"]);
            for row in &result.breakdown {
                let mut cells = vec![row.id.to_string(), row.ok.to_string()];
                cells.extend(latency_cells(&row.latency, false));
                cells.push((row.err + row.client_limit).to_string());
                workers.row(cells);
            }
            write!(f, "{workers}")?;
        }
        Ok(())
    }
}

pub fn render(config: &RunConfig, results: &[PhaseResult]) -> String {
    TextReport { config, results }.to_string()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    timestamp: String,
    workers: usize,
    duration_secs: u64,
    address: &'a str,
    results: &'a [PhaseResult],
}

pub fn to_json(config: &RunConfig, results: &[PhaseResult]) -> Result<String, RuntimeError> {
    let report = JsonReport {
        timestamp: OffsetDateTime::now_utc().format(&Rfc3339)?,
        workers: config.workers,
        duration_secs: config.duration.as_secs(),
        address: &config.addr,
        results,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub async fn export_json(
    path: &Path,
    config: &RunConfig,
    results: &[PhaseResult],
) -> Result<(), RuntimeError> {
    tokio::fs::write(path, to_json(config, results)?).await?;
    Ok(())
}
