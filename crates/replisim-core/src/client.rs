//! Arrival sources ("clients") that feed traffic into the simulation.
//!
//! A source only creates requests with an execution time. The engine
//! decides when to ask (every `period_tick` ticks) and stamps admission
//! using the settings the source exposes.

use crate::clock::Tick;
use crate::config::{ClientSpec, ConfigError};
use crate::ids::IdAllocator;
use crate::topology::Region;
use crate::traffic::Traffic;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Settings shared by every arrival source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub id: u64,
    pub location: Region,
    /// Deadline window in ticks stamped onto each request.
    pub traffic_expired_time: Option<u64>,
    /// The source is observed only on ticks divisible by this.
    pub period_tick: u64,
}

impl SourceSettings {
    pub fn fires_on(&self, tick: Tick) -> bool {
        tick % self.period_tick == 0
    }
}

/// A generator of traffic, observed by the engine on its period.
pub trait ArrivalSource: Send {
    /// Produce this observation's requests. May be empty.
    fn observe(&mut self, tick: Tick, ids: &mut IdAllocator) -> Vec<Traffic>;

    fn settings(&self) -> &SourceSettings;

    /// Type name used in configuration and in the trace.
    fn name(&self) -> &str;

    /// Source-specific parameters for the trace header.
    fn params(&self) -> Map<String, Value> {
        Map::new()
    }

    fn meta_info(&self) -> ClientMeta {
        let settings = self.settings();
        ClientMeta {
            id: settings.id,
            name: self.name().to_string(),
            location: settings.location,
            traffic_expired_time: settings.traffic_expired_time,
            period_tick: settings.period_tick,
            params: self.params(),
        }
    }
}

/// Client description in the trace header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub id: u64,
    pub name: String,
    pub location: Region,
    pub traffic_expired_time: Option<u64>,
    pub period_tick: u64,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Replays a fixed template, one slot per observation, wrapping around.
///
/// Each replay constructs a new request, so ids never repeat.
pub struct FixedTraffic {
    settings: SourceSettings,
    slots: Vec<Option<u64>>,
    idx: usize,
}

impl FixedTraffic {
    pub fn new(settings: SourceSettings, slots: Vec<Option<u64>>) -> Self {
        Self {
            settings,
            slots,
            idx: 0,
        }
    }
}

impl ArrivalSource for FixedTraffic {
    fn observe(&mut self, _tick: Tick, ids: &mut IdAllocator) -> Vec<Traffic> {
        if self.slots.is_empty() {
            return Vec::new();
        }
        let slot = self.slots[self.idx];
        self.idx = (self.idx + 1) % self.slots.len();
        slot.map(|workload| Traffic::new(ids, workload))
            .into_iter()
            .collect()
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn name(&self) -> &str {
        "fixed_traffic"
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("traffics".to_string(), json!(self.slots));
        params
    }
}

/// One request per observation with a workload drawn uniformly from a
/// candidate list.
pub struct RandomChoiceWorkload {
    settings: SourceSettings,
    candidates: Vec<u64>,
    rng: ChaCha8Rng,
}

impl RandomChoiceWorkload {
    pub fn new(settings: SourceSettings, candidates: Vec<u64>, seed: u64) -> Self {
        Self {
            settings,
            candidates,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ArrivalSource for RandomChoiceWorkload {
    fn observe(&mut self, _tick: Tick, ids: &mut IdAllocator) -> Vec<Traffic> {
        match self.candidates.choose(&mut self.rng) {
            Some(&workload) => vec![Traffic::new(ids, workload)],
            None => Vec::new(),
        }
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn name(&self) -> &str {
        "random_choice_workload"
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("workload_candidates".to_string(), json!(self.candidates));
        params
    }
}

/// Sends one fixed-size request with probability `prob`.
pub struct RandomSendRequest {
    settings: SourceSettings,
    prob: f64,
    workload: u64,
    rng: ChaCha8Rng,
}

impl RandomSendRequest {
    pub fn new(settings: SourceSettings, prob: f64, workload: u64, seed: u64) -> Self {
        Self {
            settings,
            prob,
            workload,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ArrivalSource for RandomSendRequest {
    fn observe(&mut self, _tick: Tick, ids: &mut IdAllocator) -> Vec<Traffic> {
        if self.rng.gen::<f64>() < self.prob {
            vec![Traffic::new(ids, self.workload)]
        } else {
            Vec::new()
        }
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn name(&self) -> &str {
        "random_send_request"
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("prob".to_string(), json!(self.prob));
        params.insert("workload".to_string(), json!(self.workload));
        params
    }
}

/// Diurnal load: one send probability for the first `day_tick` ticks of
/// each cycle, another for the remaining `night_tick`.
pub struct DayAndNight {
    settings: SourceSettings,
    day_prob: f64,
    night_prob: f64,
    workload: u64,
    day_tick: u64,
    night_tick: u64,
    num_req: u64,
    rng: ChaCha8Rng,
}

impl DayAndNight {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: SourceSettings,
        day_prob: f64,
        night_prob: f64,
        workload: u64,
        day_tick: u64,
        night_tick: u64,
        num_req: u64,
        seed: u64,
    ) -> Self {
        Self {
            settings,
            day_prob,
            night_prob,
            workload,
            day_tick,
            night_tick,
            num_req,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Send probability in effect at `tick`.
    pub fn prob_at(&self, tick: Tick) -> f64 {
        let cycle = self.day_tick + self.night_tick;
        if cycle == 0 || tick % cycle < self.day_tick {
            self.day_prob
        } else {
            self.night_prob
        }
    }
}

impl ArrivalSource for DayAndNight {
    fn observe(&mut self, tick: Tick, ids: &mut IdAllocator) -> Vec<Traffic> {
        let prob = self.prob_at(tick);
        if self.rng.gen::<f64>() < prob {
            (0..self.num_req)
                .map(|_| Traffic::new(ids, self.workload))
                .collect()
        } else {
            Vec::new()
        }
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn name(&self) -> &str {
        "day_and_night"
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("day_prob".to_string(), json!(self.day_prob));
        params.insert("night_prob".to_string(), json!(self.night_prob));
        params.insert("workload".to_string(), json!(self.workload));
        params.insert("day_tick".to_string(), json!(self.day_tick));
        params.insert("night_tick".to_string(), json!(self.night_tick));
        params.insert("num_req".to_string(), json!(self.num_req));
        params
    }
}

/// Emits `burst_size` requests every `burst_interval` ticks, nothing in
/// between.
pub struct Burst {
    settings: SourceSettings,
    burst_size: u64,
    burst_interval: u64,
    workload: u64,
}

impl Burst {
    pub fn new(settings: SourceSettings, burst_size: u64, burst_interval: u64, workload: u64) -> Self {
        Self {
            settings,
            burst_size,
            burst_interval: burst_interval.max(1),
            workload,
        }
    }
}

impl ArrivalSource for Burst {
    fn observe(&mut self, tick: Tick, ids: &mut IdAllocator) -> Vec<Traffic> {
        if tick % self.burst_interval != 0 {
            return Vec::new();
        }
        (0..self.burst_size)
            .map(|_| Traffic::new(ids, self.workload))
            .collect()
    }

    fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    fn name(&self) -> &str {
        "burst"
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("burst_size".to_string(), json!(self.burst_size));
        params.insert("burst_interval".to_string(), json!(self.burst_interval));
        params.insert("workload".to_string(), json!(self.workload));
        params
    }
}

/// Build an arrival source from configuration.
///
/// `seed` should differ per client; the engine mixes the run seed with the
/// client's position so sources do not share a random stream.
pub fn client_from_spec(
    spec: &ClientSpec,
    seed: u64,
    ids: &mut IdAllocator,
) -> Result<Box<dyn ArrivalSource>, ConfigError> {
    let settings = SourceSettings {
        id: ids.next_id(),
        location: Region::from_name(&spec.location)?,
        traffic_expired_time: spec.traffic_expired_time,
        period_tick: spec.period_tick,
    };
    if settings.period_tick == 0 {
        return Err(ConfigError::Validation(
            "period_tick must be > 0".to_string(),
        ));
    }

    let source: Box<dyn ArrivalSource> = match spec.kind.as_str() {
        "fixed_traffic" => {
            let slots = spec
                .traffics
                .iter()
                .map(|slot| slot.workload())
                .collect::<Result<Vec<_>, _>>()?;
            Box::new(FixedTraffic::new(settings, slots))
        }
        "random_choice_workload" => Box::new(RandomChoiceWorkload::new(
            settings,
            spec.workload_candidates.clone(),
            seed,
        )),
        "random_send_request" => Box::new(RandomSendRequest::new(
            settings,
            spec.prob,
            spec.workload,
            seed,
        )),
        "day_and_night" => Box::new(DayAndNight::new(
            settings,
            spec.day_prob,
            spec.night_prob,
            spec.workload,
            spec.day_tick,
            spec.night_tick,
            spec.num_req,
            seed,
        )),
        "burst" => Box::new(Burst::new(
            settings,
            spec.burst_size,
            spec.burst_interval,
            spec.workload,
        )),
        other => return Err(ConfigError::UnknownClientType(other.to_string())),
    };
    Ok(source)
}
