//! Tick-driven simulation engine.
//!
//! Each iteration advances the clock by one tick, admits traffic from the
//! arrival sources whose period fires, sweeps expired traffic out of the
//! replica queues, hands the new traffic to the load balancer and steps
//! every replica in registration order. The outcome of a tick is a
//! [`TickInfo`] record plus the metadata of the traffic admitted on it.

use crate::balancer::LoadBalancer;
use crate::client::{client_from_spec, ArrivalSource};
use crate::clock::{SimClock, Tick};
use crate::config::{ConfigError, ExpirationOrder, SimConfig, SimulationSection};
use crate::error::SimError;
use crate::ids::IdAllocator;
use crate::metrics::{MetricsCollector, RunSummary};
use crate::replica::replica_by_name;
use crate::topology::Region;
use crate::trace::{FinishedTraffic, MetaInfo, TickInfo, TraceError, TraceRecord, TraceWriter};
use crate::traffic::{Traffic, TrafficMeta};
use indicatif::ProgressBar;
use std::io::{BufRead, Write};
use tracing::{debug, info};

/// Loop parameters taken from the `[simulation]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Last tick simulated (inclusive).
    pub max_tick: Tick,
    pub step_tick: u64,
    pub interactive: bool,
    pub expiration_order: ExpirationOrder,
}

impl EngineSettings {
    pub fn new(max_tick: Tick) -> Self {
        Self {
            max_tick,
            step_tick: 1,
            interactive: false,
            expiration_order: ExpirationOrder::default(),
        }
    }

    pub fn with_expiration_order(mut self, order: ExpirationOrder) -> Self {
        self.expiration_order = order;
        self
    }
}

impl From<&SimulationSection> for EngineSettings {
    fn from(section: &SimulationSection) -> Self {
        Self {
            max_tick: section.max_tick,
            step_tick: section.step_tick.max(1),
            interactive: section.interactive,
            expiration_order: section.expiration_order,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub tick_info: TickInfo,
    pub new_traffic: Vec<TrafficMeta>,
}

/// The main simulation engine.
pub struct SimulationEngine {
    /// Tick clock; only the engine advances it.
    clock: SimClock,
    state: RunState,
    balancer: LoadBalancer,
    sources: Vec<Box<dyn ArrivalSource>>,
    /// Traffic ids for this run.
    traffic_ids: IdAllocator,
    settings: EngineSettings,
    pub metrics: MetricsCollector,
}

impl SimulationEngine {
    /// Create an engine over an already populated balancer.
    ///
    /// Fails if no replica is registered.
    pub fn new(
        balancer: LoadBalancer,
        sources: Vec<Box<dyn ArrivalSource>>,
        settings: EngineSettings,
    ) -> Result<Self, SimError> {
        if balancer.replicas().is_empty() {
            return Err(SimError::Config(ConfigError::Validation(
                "at least one replica is required".to_string(),
            )));
        }
        Ok(Self {
            clock: SimClock::new(),
            state: RunState::Running,
            balancer,
            sources,
            traffic_ids: IdAllocator::new(),
            settings,
            metrics: MetricsCollector::new(),
        })
    }

    /// Build replicas, clients and the configured policy from `config`.
    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        Self::with_policy(config, &config.load_balancer.policy)
    }

    /// Like [`from_config`](Self::from_config) but with the policy overridden.
    pub fn with_policy(config: &SimConfig, policy: &str) -> Result<Self, SimError> {
        let mut balancer = LoadBalancer::by_name(policy)?;
        let mut replica_ids = IdAllocator::new();
        for spec in &config.replicas {
            let replica = replica_by_name(
                &spec.kind,
                Region::from_name(&spec.location)?,
                spec.accelerator.as_deref(),
                spec.capacity,
                &mut replica_ids,
            )?;
            balancer.register(replica);
        }

        let mut client_ids = IdAllocator::new();
        let sources = config
            .clients
            .iter()
            .enumerate()
            .map(|(pos, spec)| {
                client_from_spec(spec, client_seed(config.simulation.seed, pos), &mut client_ids)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(balancer, sources, EngineSettings::from(&config.simulation))
    }

    /// Last tick simulated, or `None` before the first step.
    pub fn current_tick(&self) -> Option<Tick> {
        self.clock.has_started().then(|| self.clock.current())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The header record: client and balancer configuration.
    pub fn header(&self) -> MetaInfo {
        MetaInfo::header(
            self.sources.iter().map(|s| s.meta_info()).collect(),
            self.balancer.meta_info(),
        )
    }

    /// Run one tick. Returns `None` once the run has stopped.
    pub fn step(&mut self) -> Result<Option<TickOutcome>, SimError> {
        if self.state == RunState::Stopped {
            return Ok(None);
        }
        let tick = self.clock.advance();

        let arrivals = self.admit(tick);
        let new_traffic: Vec<TrafficMeta> = arrivals.iter().map(Traffic::meta_info).collect();
        self.metrics.record_admitted(arrivals.len());

        let mut finished = Vec::new();
        if self.settings.expiration_order == ExpirationOrder::DeadlineFirst {
            finished.extend(self.sweep_expired(tick));
        }

        let assignment = self.balancer.assign(arrivals)?;
        for (replica, (replica_id, incoming)) in
            self.balancer.replicas_mut().iter_mut().zip(assignment)
        {
            if replica.id() != replica_id {
                return Err(SimError::InvariantViolation(format!(
                    "assignment for replica {} delivered to replica {}",
                    replica_id,
                    replica.id()
                )));
            }
            finished.extend(replica.step(incoming, tick));
        }

        if self.settings.expiration_order == ExpirationOrder::ComputeFirst {
            finished.extend(self.sweep_expired(tick));
        }
        self.balancer.verify_exclusive_ownership()?;

        let finished_traffics: Vec<FinishedTraffic> =
            finished.iter().map(FinishedTraffic::from_traffic).collect();
        self.metrics.record_finished(&finished_traffics);
        self.metrics.record_tick();
        if !finished_traffics.is_empty() {
            debug!(
                tick,
                finished = finished_traffics.len(),
                expired = finished.iter().filter(|t| t.is_expired()).count(),
                "traffic left the replicas"
            );
        }

        if tick >= self.settings.max_tick {
            self.state = RunState::Stopped;
            info!(tick, "simulation reached max_tick");
        }

        Ok(Some(TickOutcome {
            tick_info: TickInfo {
                tick,
                finished_traffics,
                lb_info: self.balancer.info(),
            },
            new_traffic,
        }))
    }

    /// Observe every source whose period fires on `tick` and stamp admission.
    fn admit(&mut self, tick: Tick) -> Vec<Traffic> {
        let mut arrivals = Vec::new();
        for source in self.sources.iter_mut() {
            if !source.settings().fires_on(tick) {
                continue;
            }
            let expired_time = source.settings().traffic_expired_time;
            let location = source.settings().location;
            for mut traffic in source.observe(tick, &mut self.traffic_ids) {
                traffic.stamp_admission(tick, expired_time, Some(location));
                arrivals.push(traffic);
            }
        }
        arrivals
    }

    /// Pull every request whose deadline has passed out of the queues.
    fn sweep_expired(&mut self, tick: Tick) -> Vec<Traffic> {
        let mut expired = Vec::new();
        for replica in self.balancer.replicas_mut() {
            expired.extend(replica.take_expired(tick));
        }
        if !expired.is_empty() {
            debug!(tick, count = expired.len(), "expired traffic removed");
        }
        expired
    }

    /// Summary of the run so far.
    pub fn summary(&self) -> RunSummary {
        self.metrics.summarize(self.balancer.policy_name())
    }

    /// Run to completion, writing every record to `writer`.
    ///
    /// In interactive mode the tick record is also printed and the run waits
    /// for a line on stdin every `step_tick` ticks.
    pub fn run<W: Write>(
        &mut self,
        writer: &mut TraceWriter<W>,
        progress: &ProgressBar,
    ) -> Result<RunSummary, SimError> {
        info!(
            policy = self.balancer.policy_name(),
            replicas = self.balancer.replicas().len(),
            clients = self.sources.len(),
            max_tick = self.settings.max_tick,
            "starting simulation"
        );
        writer.write_record(&TraceRecord::MetaInfo(self.header()))?;

        while let Some(outcome) = self.step()? {
            let tick = outcome.tick_info.tick;
            let record = TraceRecord::TickInfo(outcome.tick_info);
            writer.write_record(&record)?;
            writer.write_record(&TraceRecord::MetaInfo(MetaInfo::new_traffic(
                outcome.new_traffic,
            )))?;
            progress.inc(1);

            if tick % self.settings.step_tick == 0 {
                if self.settings.interactive {
                    writer.flush()?;
                    let pretty =
                        serde_json::to_string_pretty(&record).map_err(TraceError::Encode)?;
                    println!("{}", pretty);
                    wait_for_line()?;
                } else {
                    debug!(
                        tick,
                        completed = self.metrics.completed(),
                        failed = self.metrics.failed(),
                        in_flight = self.metrics.in_flight(),
                        "progress"
                    );
                }
            }
        }
        writer.flush()?;
        progress.finish();

        let ticks = self.metrics.ticks().max(1);
        for replica in self.balancer.replicas() {
            debug!(
                replica = replica.id(),
                completed = replica.total_completed(),
                expired = replica.total_expired(),
                utilization = replica.busy_units() as f64 / (replica.capacity() * ticks) as f64,
                "replica totals"
            );
        }
        let summary = self.summary();
        info!(
            policy = %summary.policy,
            completed = summary.completed,
            failed = summary.failed,
            in_flight = summary.in_flight,
            "simulation finished"
        );
        Ok(summary)
    }
}

fn wait_for_line() -> Result<(), SimError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

/// Seed for the client at `position`, so sources never share a stream.
pub fn client_seed(seed: u64, position: usize) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(position as u64)
}
