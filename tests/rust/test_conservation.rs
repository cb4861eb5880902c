/// Property tests: no traffic is lost or double-counted.
use proptest::prelude::*;
use replisim_core::balancer::LoadBalancer;
use replisim_core::client::{ArrivalSource, FixedTraffic, SourceSettings};
use replisim_core::config::ExpirationOrder;
use replisim_core::engine::{EngineSettings, SimulationEngine};
use replisim_core::replica::{Replica, ReplicaKind};
use replisim_core::topology::Region;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct Scenario {
    policy: &'static str,
    capacities: Vec<u64>,
    templates: Vec<(Vec<Option<u64>>, u64, u64)>,
    max_tick: u64,
    order: ExpirationOrder,
}

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    let template = (
        prop::collection::vec(prop::option::of(0u64..12), 1..6),
        1u64..4,
        1u64..15,
    );
    (
        prop::sample::select(vec!["round_robin", "least_load"]),
        prop::collection::vec(1u64..6, 1..5),
        prop::collection::vec(template, 1..4),
        10u64..80,
        prop::bool::ANY,
    )
        .prop_map(|(policy, capacities, templates, max_tick, compute_first)| Scenario {
            policy,
            capacities,
            templates,
            max_tick,
            order: if compute_first {
                ExpirationOrder::ComputeFirst
            } else {
                ExpirationOrder::DeadlineFirst
            },
        })
}

fn build(scenario: &Scenario) -> SimulationEngine {
    let mut balancer = LoadBalancer::by_name(scenario.policy).unwrap();
    for (i, &capacity) in scenario.capacities.iter().enumerate() {
        balancer.register(
            Replica::new(i as u64 + 1, ReplicaKind::FixedCapacity, Region::Us, capacity).unwrap(),
        );
    }
    let sources: Vec<Box<dyn ArrivalSource>> = scenario
        .templates
        .iter()
        .enumerate()
        .map(|(i, (slots, period_tick, window))| {
            Box::new(FixedTraffic::new(
                SourceSettings {
                    id: i as u64 + 1,
                    location: Region::Asia,
                    traffic_expired_time: Some(*window),
                    period_tick: *period_tick,
                },
                slots.clone(),
            )) as Box<dyn ArrivalSource>
        })
        .collect();
    SimulationEngine::new(
        balancer,
        sources,
        EngineSettings::new(scenario.max_tick).with_expiration_order(scenario.order),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]
    #[test]
    fn traffic_is_conserved(scenario in arb_scenario()) {
        let mut engine = build(&scenario);
        // id -> tick by which it must have left the system
        let mut deadlines = BTreeMap::new();
        let mut finished = BTreeSet::new();

        while let Some(outcome) = engine.step().unwrap() {
            for meta in &outcome.new_traffic {
                let start = meta.start_time.unwrap();
                deadlines.insert(meta.id, start + meta.expired_time.unwrap());
            }
            for item in &outcome.tick_info.finished_traffics {
                prop_assert!(deadlines.contains_key(&item.id()), "unknown traffic {}", item.id());
                prop_assert!(finished.insert(item.id()), "traffic {} reported twice", item.id());
                prop_assert_eq!(item.expired(), item.latency().is_none());
            }
        }

        let summary = engine.summary();
        prop_assert_eq!(summary.admitted, deadlines.len() as u64);
        prop_assert_eq!(summary.admitted, summary.completed + summary.failed + summary.in_flight);
        prop_assert_eq!(summary.completed + summary.failed, finished.len() as u64);

        let queued: u64 = engine
            .balancer()
            .replicas()
            .iter()
            .map(|r| r.queue_length() as u64)
            .sum();
        prop_assert_eq!(queued, summary.in_flight);

        for (id, due) in &deadlines {
            if *due <= scenario.max_tick {
                prop_assert!(finished.contains(id), "traffic {} due at tick {} never reported", id, due);
            }
        }
    }
}
