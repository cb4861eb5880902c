//! TOML configuration parsing for replisim.
//!
//! Defines the configuration schema for a simulation run: loop settings,
//! arrival sources, the load-balancing policy, and the replica fleet.
//! Every problem is reported here, before the first tick.

use crate::topology::{AcceleratorType, Region};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("Unknown load balancer policy: {0}")]
    UnknownPolicy(String),
    #[error("Unknown replica type: {0}")]
    UnknownReplicaType(String),
    #[error("Unknown client type: {0}")]
    UnknownClientType(String),
    #[error("Unknown accelerator: {0}")]
    UnknownAccelerator(String),
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub simulation: SimulationSection,
    #[serde(default)]
    pub load_balancer: LoadBalancerSection,
    #[serde(default)]
    pub clients: Vec<ClientSpec>,
    #[serde(default)]
    pub replicas: Vec<ReplicaSpec>,
}

/// Which happens first on a tick: the deadline sweep or replica compute.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationOrder {
    /// Sweep deadlines before new traffic is assigned. A request whose
    /// deadline falls on the tick it would have finished counts as failed.
    #[default]
    DeadlineFirst,
    /// Let replicas compute first and sweep what is still queued afterwards.
    ComputeFirst,
}

/// Loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Last tick to simulate (inclusive); 0 runs a single tick.
    #[serde(default = "default_max_tick")]
    pub max_tick: u64,
    /// Interval for progress logging and interactive pauses.
    #[serde(default = "default_step_tick")]
    pub step_tick: u64,
    /// JSONL trace destination.
    pub output_path: Option<PathBuf>,
    /// Pause for a line on stdin every `step_tick` ticks.
    #[serde(default)]
    pub interactive: bool,
    #[serde(default = "default_with_pbar")]
    pub with_pbar: bool,
    /// Seed for the random arrival sources.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub expiration_order: ExpirationOrder,
}

fn default_max_tick() -> u64 {
    1000
}
fn default_step_tick() -> u64 {
    1
}
fn default_with_pbar() -> bool {
    true
}
fn default_seed() -> u64 {
    42
}

/// Load-balancing policy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerSection {
    #[serde(rename = "type", default = "default_policy")]
    pub policy: String,
}

fn default_policy() -> String {
    "round_robin".to_string()
}

impl Default for LoadBalancerSection {
    fn default() -> Self {
        Self {
            policy: default_policy(),
        }
    }
}

/// One slot of a `fixed_traffic` template: a workload, or the string
/// `"idle"` for a tick that produces nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrafficSlot {
    Work(u64),
    Marker(String),
}

impl TrafficSlot {
    pub fn workload(&self) -> Result<Option<u64>, ConfigError> {
        match self {
            TrafficSlot::Work(w) => Ok(Some(*w)),
            TrafficSlot::Marker(m) if m == "idle" => Ok(None),
            TrafficSlot::Marker(m) => Err(ConfigError::Validation(format!(
                "fixed_traffic slot must be an integer or \"idle\", got {:?}",
                m
            ))),
        }
    }
}

/// Arrival source configuration. Which fields matter depends on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    /// Deadline window in ticks for traffic from this client.
    pub traffic_expired_time: Option<u64>,
    #[serde(default = "default_period_tick")]
    pub period_tick: u64,
    /// fixed_traffic: workload template, cycled one slot per observation.
    #[serde(default)]
    pub traffics: Vec<TrafficSlot>,
    /// random_choice_workload: candidate workloads.
    #[serde(default)]
    pub workload_candidates: Vec<u64>,
    /// random_send_request: chance of sending on an observation.
    #[serde(default)]
    pub prob: f64,
    /// Workload of each generated request.
    #[serde(default)]
    pub workload: u64,
    /// day_and_night: send probabilities and phase lengths.
    #[serde(default)]
    pub day_prob: f64,
    #[serde(default)]
    pub night_prob: f64,
    #[serde(default)]
    pub day_tick: u64,
    #[serde(default)]
    pub night_tick: u64,
    /// day_and_night: requests per send.
    #[serde(default = "default_num_req")]
    pub num_req: u64,
    /// burst: requests per burst and ticks between bursts.
    #[serde(default)]
    pub burst_size: u64,
    #[serde(default = "default_burst_interval")]
    pub burst_interval: u64,
}

fn default_period_tick() -> u64 {
    1
}
fn default_num_req() -> u64 {
    1
}
fn default_burst_interval() -> u64 {
    1
}

/// Replica configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaSpec {
    #[serde(rename = "type", default = "default_replica_type")]
    pub kind: String,
    pub location: String,
    pub accelerator: Option<String>,
    pub capacity: Option<u64>,
}

fn default_replica_type() -> String {
    "accelerator".to_string()
}

const CLIENT_TYPES: &[&str] = &[
    "fixed_traffic",
    "random_choice_workload",
    "random_send_request",
    "day_and_night",
    "burst",
];

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// The configured trace path.
    pub fn output_path(&self) -> Result<&Path, ConfigError> {
        self.simulation
            .output_path
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("simulation.output_path is required".into()))
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let path = self.output_path()?;
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            return Err(ConfigError::Validation(format!(
                "output_path must end with .jsonl, got {}",
                path.display()
            )));
        }
        if self.simulation.step_tick == 0 {
            return Err(ConfigError::Validation("step_tick must be > 0".to_string()));
        }
        if replisim_balancers::policy_by_name(&self.load_balancer.policy).is_none() {
            return Err(ConfigError::UnknownPolicy(self.load_balancer.policy.clone()));
        }
        if self.clients.is_empty() {
            return Err(ConfigError::Validation(
                "at least one client is required".to_string(),
            ));
        }
        if self.replicas.is_empty() {
            return Err(ConfigError::Validation(
                "at least one replica is required".to_string(),
            ));
        }
        for client in &self.clients {
            client.validate()?;
        }
        for replica in &self.replicas {
            replica.validate()?;
        }
        Ok(())
    }
}

impl ClientSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        if !CLIENT_TYPES.contains(&self.kind.as_str()) {
            return Err(ConfigError::UnknownClientType(self.kind.clone()));
        }
        Region::from_name(&self.location)?;
        if self.period_tick == 0 {
            return Err(ConfigError::Validation(format!(
                "client {}: period_tick must be > 0",
                self.kind
            )));
        }
        if self.traffic_expired_time == Some(0) {
            warn!(
                client = %self.kind,
                "traffic_expired_time = 0: every request that is still queued one tick after arrival will expire"
            );
        }
        match self.kind.as_str() {
            "fixed_traffic" => {
                if self.traffics.is_empty() {
                    return Err(ConfigError::Validation(
                        "fixed_traffic needs a non-empty `traffics` list".to_string(),
                    ));
                }
                for slot in &self.traffics {
                    slot.workload()?;
                }
            }
            "random_choice_workload" if self.workload_candidates.is_empty() => {
                return Err(ConfigError::Validation(
                    "random_choice_workload needs `workload_candidates`".to_string(),
                ));
            }
            "random_send_request" => check_probability("prob", self.prob)?,
            "day_and_night" => {
                check_probability("day_prob", self.day_prob)?;
                check_probability("night_prob", self.night_prob)?;
                if self.day_tick + self.night_tick == 0 {
                    return Err(ConfigError::Validation(
                        "day_and_night needs day_tick + night_tick > 0".to_string(),
                    ));
                }
            }
            "burst" if self.burst_interval == 0 => {
                return Err(ConfigError::Validation(
                    "burst_interval must be > 0".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

fn check_probability(field: &str, p: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(ConfigError::Validation(format!(
            "{} must be within [0, 1], got {}",
            field, p
        )));
    }
    Ok(())
}

impl ReplicaSpec {
    fn validate(&self) -> Result<(), ConfigError> {
        Region::from_name(&self.location)?;
        match self.kind.as_str() {
            "accelerator" => {
                let name = self.accelerator.as_deref().ok_or_else(|| {
                    ConfigError::Validation("accelerator replica needs an `accelerator`".into())
                })?;
                AcceleratorType::from_name(name)?;
            }
            "fixed_capacity" => match self.capacity {
                Some(c) if c > 0 => {}
                _ => {
                    return Err(ConfigError::Validation(
                        "fixed_capacity replica needs a positive `capacity`".into(),
                    ))
                }
            },
            other => return Err(ConfigError::UnknownReplicaType(other.to_string())),
        }
        Ok(())
    }
}
