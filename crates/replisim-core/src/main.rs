//! replisim CLI: run tick simulations of replica load balancing.

use clap::{Parser, Subcommand};
use replisim_core::config::SimConfig;
use replisim_core::metrics;
use replisim_core::trace;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "replisim",
    about = "Simulate request load balancing across replicas, one tick at a time",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation with a single policy.
    Run {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Assignment policy name, overriding `load_balancer.type`.
        #[arg(short, long)]
        policy: Option<String>,
        /// Trace output path, overriding `simulation.output_path`.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the run summary as JSON.
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Compare several policies on the same configuration.
    Compare {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated list of policy names.
        #[arg(short, long, value_delimiter = ',')]
        policies: Vec<String>,
        /// Write all summaries as JSON.
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Summarize an existing trace file.
    Analyze {
        /// Trace file written by `run` or `compare`.
        #[arg(short, long)]
        trace: PathBuf,
    },
    /// List available assignment policies.
    ListPolicies,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            policy,
            output,
            summary,
        } => {
            let mut sim_config = load_config(&config);
            if let Some(policy) = policy {
                sim_config.load_balancer.policy = policy;
            }
            if let Some(output) = output {
                sim_config.simulation.output_path = Some(output);
            }
            sim_config
                .validate()
                .unwrap_or_else(|e| exit_with("Invalid configuration", e));

            let result = replisim_core::run_simulation(&sim_config)
                .unwrap_or_else(|e| exit_with("Simulation failed", e));
            println!("{}", metrics::format_table(&result));

            if let Some(path) = summary {
                write_json(&path, &result);
            }
        }
        Commands::Compare {
            config,
            policies,
            summary,
        } => {
            let sim_config = load_config(&config);
            let names: Vec<&str> = if policies.is_empty() {
                replisim_balancers::available_policies()
            } else {
                policies.iter().map(|s| s.as_str()).collect()
            };
            for name in &names {
                if replisim_balancers::policy_by_name(name).is_none() {
                    exit_with(
                        "Unknown policy",
                        format!(
                            "{} (available: {:?})",
                            name,
                            replisim_balancers::available_policies()
                        ),
                    );
                }
            }

            let results = replisim_core::compare_policies(&sim_config, &names)
                .unwrap_or_else(|e| exit_with("Comparison failed", e));
            println!("{}", metrics::format_comparison_table(&results));
            for result in &results {
                println!("{}", metrics::format_table(result));
            }

            if let Some(path) = summary {
                write_json(&path, &results);
            }
        }
        Commands::Analyze { trace: trace_path } => {
            let file = File::open(&trace_path)
                .map_err(trace::TraceError::from)
                .unwrap_or_else(|e| exit_with("Error opening trace", e));
            let result = metrics::summarize_trace(BufReader::new(file))
                .unwrap_or_else(|e| exit_with("Error reading trace", e));
            println!("{}", metrics::format_table(&result));
        }
        Commands::ListPolicies => {
            println!("Available assignment policies:");
            for name in replisim_balancers::available_policies() {
                println!("  - {}", name);
            }
            println!("Available replica types:");
            for name in replisim_core::replica::available_replica_types() {
                println!("  - {}", name);
            }
        }
    }
}

fn load_config(path: &std::path::Path) -> SimConfig {
    SimConfig::from_file(path).unwrap_or_else(|e| exit_with("Error loading config", e))
}

fn write_json<T: serde::Serialize>(path: &std::path::Path, value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| exit_with("Error encoding summary", e));
    std::fs::write(path, json).unwrap_or_else(|e| exit_with("Error writing summary", e));
    info!(path = %path.display(), "summary written");
}

fn exit_with(context: &str, err: impl Display) -> ! {
    error!("{}: {}", context, err);
    std::process::exit(1);
}
