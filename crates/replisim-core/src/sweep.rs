//! Independent runs side by side.
//!
//! Runs share nothing: each builds its own engine, clock, id allocators,
//! replicas and clients from the configuration, so they execute on the
//! rayon pool and write to separate trace files.

use crate::config::SimConfig;
use crate::engine::SimulationEngine;
use crate::error::SimError;
use crate::metrics::RunSummary;
use crate::trace::TraceWriter;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

fn in_progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>.")
}

/// A tick progress bar for one run, or a hidden one.
pub fn progress_bar(ticks: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(ticks);
    pb.set_style(in_progress_style());
    pb
}

/// `out/trace.jsonl` + `least_load` -> `out/trace.least_load.jsonl`.
pub fn policy_output_path(base: &Path, policy: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("trace");
    base.with_file_name(format!("{}.{}.jsonl", stem, policy))
}

/// Run the same configuration once per policy, in parallel.
///
/// Summaries come back in the order of `policies`, with repeated names run
/// once since they would share a trace file. Interactive stepping is turned
/// off for sweeps.
pub fn compare_policies(config: &SimConfig, policies: &[&str]) -> Result<Vec<RunSummary>, SimError> {
    let policies = unique_in_order(policies);
    let base = config.output_path()?.to_path_buf();
    let mut config = config.clone();
    config.simulation.interactive = false;
    let ticks = config.simulation.max_tick + 1;
    let multi = MultiProgress::new();

    info!(runs = policies.len(), "comparing policies");
    policies
        .par_iter()
        .map(|policy| {
            let pb = if config.simulation.with_pbar {
                let pb = multi.add(progress_bar(ticks, true));
                pb.set_message(policy.to_string());
                pb
            } else {
                ProgressBar::hidden()
            };
            let mut engine = SimulationEngine::with_policy(&config, policy)?;
            let path = policy_output_path(&base, policy);
            let mut writer = TraceWriter::create(&path)?;
            let summary = engine.run(&mut writer, &pb)?;
            info!(policy = %policy, path = %path.display(), "trace written");
            Ok(summary)
        })
        .collect()
}

fn unique_in_order<'a>(names: &[&'a str]) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    names.iter().copied().filter(|name| seen.insert(*name)).collect()
}
