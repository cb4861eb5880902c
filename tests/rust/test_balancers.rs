/// Integration tests for the load balancer and its assignment policies.
use replisim_balancers::*;
use replisim_core::balancer::LoadBalancer;
use replisim_core::ids::IdAllocator;
use replisim_core::replica::{Replica, ReplicaKind};
use replisim_core::topology::Region;
use replisim_core::traffic::Traffic;
use replisim_core::SimError;

fn admitted(ids: &mut IdAllocator, execution_time: u64) -> Traffic {
    let mut traffic = Traffic::new(ids, execution_time);
    traffic.stamp_admission(0, None, Some(Region::Us));
    traffic
}

/// A balancer whose replicas already hold `queue_lengths` long-running items.
fn loaded_balancer(policy: &str, queue_lengths: &[usize], ids: &mut IdAllocator) -> LoadBalancer {
    let mut balancer = LoadBalancer::by_name(policy).unwrap();
    for (i, &len) in queue_lengths.iter().enumerate() {
        let mut replica =
            Replica::new(i as u64 + 1, ReplicaKind::FixedCapacity, Region::Us, 1).unwrap();
        let backlog: Vec<Traffic> = (0..len).map(|_| admitted(ids, 1_000)).collect();
        replica.step(backlog, 0);
        assert_eq!(replica.queue_length(), len);
        balancer.register(replica);
    }
    balancer
}

fn assigned_counts(assignment: &[(u64, Vec<Traffic>)]) -> Vec<usize> {
    assignment.iter().map(|(_, items)| items.len()).collect()
}

#[test]
fn test_round_robin_item_i_goes_to_i_mod_n() {
    let mut ids = IdAllocator::new();
    let mut balancer = loaded_balancer("round_robin", &[0, 0, 0], &mut ids);
    let traffic: Vec<Traffic> = (0..7).map(|_| admitted(&mut ids, 1)).collect();
    let traffic_ids: Vec<u64> = traffic.iter().map(Traffic::id).collect();

    let assignment = balancer.assign(traffic).unwrap();
    for (position, (_, items)) in assignment.iter().enumerate() {
        let expected: Vec<u64> = traffic_ids
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 == position)
            .map(|(_, id)| *id)
            .collect();
        let got: Vec<u64> = items.iter().map(Traffic::id).collect();
        assert_eq!(got, expected);
    }
}

#[test]
fn test_round_robin_cursor_survives_between_ticks() {
    let mut ids = IdAllocator::new();
    let mut balancer = loaded_balancer("round_robin", &[0, 0], &mut ids);
    let first = balancer.assign(vec![admitted(&mut ids, 1)]).unwrap();
    assert_eq!(assigned_counts(&first), vec![1, 0]);
    let second = balancer.assign(vec![admitted(&mut ids, 1)]).unwrap();
    assert_eq!(assigned_counts(&second), vec![0, 1]);
    assert_eq!(balancer.info().policy_state.get("idx"), Some(&0));
}

#[test]
fn test_least_load_picks_shortest_queue() {
    let mut ids = IdAllocator::new();
    let mut balancer = loaded_balancer("least_load", &[3, 1, 2], &mut ids);
    let assignment = balancer.assign(vec![admitted(&mut ids, 1)]).unwrap();
    assert_eq!(assigned_counts(&assignment), vec![0, 1, 0]);
}

#[test]
fn test_least_load_tie_goes_to_first_registered() {
    let mut ids = IdAllocator::new();
    let mut balancer = loaded_balancer("least_load", &[2, 2], &mut ids);
    let assignment = balancer.assign(vec![admitted(&mut ids, 1)]).unwrap();
    assert_eq!(assigned_counts(&assignment), vec![1, 0]);
}

#[test]
fn test_least_load_uses_projected_lengths() {
    let mut ids = IdAllocator::new();
    let mut balancer = loaded_balancer("least_load", &[2, 0, 1], &mut ids);
    let traffic: Vec<Traffic> = (0..4).map(|_| admitted(&mut ids, 1)).collect();
    let assignment = balancer.assign(traffic).unwrap();
    // Projected lengths go [2,0,1] -> [2,1,1] -> [2,2,1] -> [2,2,2] -> [3,2,2].
    assert_eq!(assigned_counts(&assignment), vec![1, 2, 1]);
}

#[test]
fn test_assignment_covers_every_replica() {
    for policy in available_policies() {
        let mut ids = IdAllocator::new();
        let mut balancer = loaded_balancer(policy, &[0, 4, 0, 0], &mut ids);
        let assignment = balancer.assign(Vec::new()).unwrap();
        let keys: Vec<u64> = assignment.iter().map(|(id, _)| *id).collect();
        assert_eq!(keys, vec![1, 2, 3, 4], "policy {}", policy);
        assert!(assignment.iter().all(|(_, items)| items.is_empty()));
    }
}

#[test]
fn test_assignment_preserves_every_item_once() {
    for policy in available_policies() {
        let mut ids = IdAllocator::new();
        let mut balancer = loaded_balancer(policy, &[1, 0, 2], &mut ids);
        let traffic: Vec<Traffic> = (0..10).map(|_| admitted(&mut ids, 1)).collect();
        let mut expected: Vec<u64> = traffic.iter().map(Traffic::id).collect();

        let assignment = balancer.assign(traffic).unwrap();
        let mut got: Vec<u64> = assignment
            .iter()
            .flat_map(|(_, items)| items.iter().map(Traffic::id))
            .collect();
        got.sort_unstable();
        expected.sort_unstable();
        assert_eq!(got, expected, "policy {}", policy);
    }
}

#[test]
fn test_assign_without_replicas_fails() {
    let mut ids = IdAllocator::new();
    let mut balancer = LoadBalancer::by_name("round_robin").unwrap();
    match balancer.assign(vec![admitted(&mut ids, 1)]) {
        Err(SimError::Balance(BalanceError::NoReplicas)) => {}
        other => panic!("Expected NoReplicas, got {:?}", other.map(|a| a.len())),
    }
}

#[test]
fn test_policy_registry() {
    for name in available_policies() {
        let policy = policy_by_name(name).unwrap();
        assert_eq!(policy.name(), name);
    }
    assert!(policy_by_name("weighted").is_none());
    assert!(LoadBalancer::by_name("weighted").is_err());
}
