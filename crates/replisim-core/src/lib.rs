//! replisim: tick-driven simulator for request load balancing across
//! heterogeneous replicas.
//!
//! This crate provides the simulation engine: a tick clock, traffic with
//! deadlines, replicas that drain their queue head-of-line with a fixed
//! per-tick capacity, and arrival sources that feed them. Assignment
//! policies from `replisim-balancers` decide which replica each newly
//! arrived request joins.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────┐     ┌──────────────┐
//! │ Arrival  │────▶│  Engine   │────▶│ JSONL trace  │
//! │ sources  │     │  (ticks)  │     │  + summary   │
//! └──────────┘     └─────┬─────┘     └──────────────┘
//!                        │
//!                ┌───────┴───────┐
//!                │ LoadBalancer  │
//!                │   (policy)    │
//!                └───────┬───────┘
//!                        │
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!    ┌──────────┐  ┌──────────┐  ┌──────────┐
//!    │ Replica 1│  │ Replica 2│  │ Replica N│
//!    │  Queue   │  │  Queue   │  │  Queue   │
//!    └──────────┘  └──────────┘  └──────────┘
//! ```

pub mod balancer;
pub mod client;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod replica;
pub mod sweep;
pub mod topology;
pub mod trace;
pub mod traffic;

// Re-export key types for convenience.
pub use balancer::{Assignment, LoadBalancer};
pub use client::{client_from_spec, ArrivalSource};
pub use clock::{SimClock, Tick};
pub use config::{ExpirationOrder, SimConfig};
pub use engine::{EngineSettings, SimulationEngine, TickOutcome};
pub use error::SimError;
pub use ids::IdAllocator;
pub use metrics::{MetricsCollector, RunSummary};
pub use replica::{replica_by_name, Replica};
pub use sweep::compare_policies;
pub use topology::{AcceleratorType, Region};
pub use trace::{TraceRecord, TraceWriter};
pub use traffic::Traffic;

/// Run one simulation from configuration, writing its trace to
/// `simulation.output_path`.
pub fn run_simulation(config: &SimConfig) -> Result<RunSummary, SimError> {
    let mut engine = SimulationEngine::from_config(config)?;
    let mut writer = TraceWriter::create(config.output_path()?)?;
    let pb = sweep::progress_bar(
        config.simulation.max_tick + 1,
        config.simulation.with_pbar && !config.simulation.interactive,
    );
    engine.run(&mut writer, &pb)
}
