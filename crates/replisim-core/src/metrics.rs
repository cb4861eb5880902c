//! Run statistics.
//!
//! The engine feeds a [`MetricsCollector`] every tick; a finished trace can
//! also be summarized after the fact with [`summarize_trace`].

use crate::clock::Tick;
use crate::trace::{read_trace, FinishedTraffic, TraceError, TraceRecord};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Read};

/// Percentile values for a distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Percentiles {
    /// Compute percentiles from a slice of values.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                p50: 0.0,
                p95: 0.0,
                p99: 0.0,
                p999: 0.0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;

        Self {
            p50: percentile_sorted(&sorted, 50.0),
            p95: percentile_sorted(&sorted, 95.0),
            p99: percentile_sorted(&sorted, 99.0),
            p999: percentile_sorted(&sorted, 99.9),
            min: sorted[0],
            max: sorted[n - 1],
            mean,
        }
    }
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Outcome of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Assignment policy name.
    pub policy: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Requests admitted from arrival sources.
    pub admitted: u64,
    /// Requests that finished their compute.
    pub completed: u64,
    /// Requests that expired.
    pub failed: u64,
    /// Requests still queued when the run stopped.
    pub in_flight: u64,
    /// failed / (completed + failed).
    pub failure_rate: f64,
    /// Latency of completed requests, in ticks.
    pub latency: Percentiles,
}

/// Accumulates per-tick outcomes during a run.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    ticks: u64,
    admitted: u64,
    failed: u64,
    latencies: Vec<u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self) {
        self.ticks += 1;
    }

    pub fn record_admitted(&mut self, count: usize) {
        self.admitted += count as u64;
    }

    /// Record what left the replicas on one tick.
    pub fn record_finished(&mut self, finished: &[FinishedTraffic]) {
        for item in finished {
            match (item.expired(), item.latency()) {
                (false, Some(latency)) => self.latencies.push(latency),
                _ => self.failed += 1,
            }
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    pub fn completed(&self) -> u64 {
        self.latencies.len() as u64
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Requests admitted but not yet reported finished.
    pub fn in_flight(&self) -> u64 {
        self.admitted
            .saturating_sub(self.completed())
            .saturating_sub(self.failed)
    }

    pub fn summarize(&self, policy: &str) -> RunSummary {
        let latencies: Vec<f64> = self.latencies.iter().map(|&l| l as f64).collect();
        let completed = self.completed();
        let finished = completed + self.failed;
        RunSummary {
            policy: policy.to_string(),
            ticks: self.ticks,
            admitted: self.admitted,
            completed,
            failed: self.failed,
            in_flight: self.in_flight(),
            failure_rate: if finished > 0 {
                self.failed as f64 / finished as f64
            } else {
                0.0
            },
            latency: Percentiles::from_values(&latencies),
        }
    }
}

/// Rebuild a [`RunSummary`] from a written trace.
pub fn summarize_trace<R: Read>(reader: BufReader<R>) -> Result<RunSummary, TraceError> {
    let records = read_trace(reader)?;
    let mut collector = MetricsCollector::new();
    let mut policy = String::from("unknown");
    let mut last_tick: Option<Tick> = None;

    for record in &records {
        match record {
            TraceRecord::MetaInfo(meta) => {
                if let Some(lb) = &meta.lb {
                    policy = lb.name.clone();
                }
                if let Some(new_traffic) = &meta.new_traffic {
                    collector.record_admitted(new_traffic.len());
                }
            }
            TraceRecord::TickInfo(info) => {
                collector.record_tick();
                collector.record_finished(&info.finished_traffics);
                last_tick = Some(info.tick);
            }
        }
    }
    tracing::debug!(records = records.len(), ?last_tick, "trace summarized");
    Ok(collector.summarize(&policy))
}

/// Format a run summary as a table.
pub fn format_table(summary: &RunSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<70}\n",
        format!("  {} Results  ", summary.policy)
    ));
    out.push_str(&format!(
        "  Ticks: {} | Admitted: {} | In flight: {}\n",
        summary.ticks, summary.admitted, summary.in_flight
    ));
    out.push_str(&format!("{:-<70}\n", "  Outcomes  "));
    out.push_str(&format!(
        "  Completed: {}  Failed: {}  Failure rate: {:.1}%\n",
        summary.completed,
        summary.failed,
        summary.failure_rate * 100.0
    ));
    out.push_str(&format!("{:-<70}\n", "  Latency (ticks)  "));
    out.push_str(&format!(
        "  P50={:>8.1}  P95={:>8.1}  P99={:>8.1}  P99.9={:>8.1}\n",
        summary.latency.p50, summary.latency.p95, summary.latency.p99, summary.latency.p999
    ));
    out.push_str(&format!(
        "  Mean={:>7.1}  Min={:>8.1}  Max={:>8.1}\n",
        summary.latency.mean, summary.latency.min, summary.latency.max
    ));
    out.push_str(&format!("{:=<70}\n", ""));
    out
}

/// Format a comparison table of several runs.
pub fn format_comparison_table(results: &[RunSummary]) -> String {
    if results.is_empty() {
        return String::from("No results to compare.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("\n{:=<80}\n", "  Policy Comparison  "));
    out.push_str(&format!(
        "{:<16} {:>9} {:>9} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
        "Policy", "Completed", "Failed", "Fail%", "p50", "p95", "p99", "Mean"
    ));
    out.push_str(&format!("{:-<80}\n", ""));

    for s in results {
        out.push_str(&format!(
            "{:<16} {:>9} {:>9} {:>7.1}% {:>8.1} {:>8.1} {:>8.1} {:>8.1}\n",
            s.policy,
            s.completed,
            s.failed,
            s.failure_rate * 100.0,
            s.latency.p50,
            s.latency.p95,
            s.latency.p99,
            s.latency.mean,
        ));
    }
    out.push_str(&format!("{:=<80}\n", ""));
    out
}
