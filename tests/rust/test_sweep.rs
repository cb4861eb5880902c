/// Integration tests for side-by-side policy runs.
use replisim_core::config::SimConfig;
use replisim_core::metrics::summarize_trace;
use replisim_core::sweep::{compare_policies, policy_output_path};
use std::fs::File;
use std::io::BufReader;

fn sweep_config(output: &std::path::Path) -> SimConfig {
    let mut config = SimConfig::from_str(
        r#"
[simulation]
max_tick = 40
output_path = "placeholder.jsonl"
with_pbar = false

[[clients]]
type = "fixed_traffic"
location = "us"
traffics = [6, 2, "idle", 5]
traffic_expired_time = 8

[[clients]]
type = "burst"
location = "asia"
burst_size = 4
burst_interval = 10
workload = 3
traffic_expired_time = 6

[[replicas]]
location = "us"
accelerator = "T4"

[[replicas]]
type = "fixed_capacity"
location = "asia"
capacity = 2
"#,
    )
    .unwrap();
    config.simulation.output_path = Some(output.to_path_buf());
    config
}

#[test]
fn test_compare_policies_writes_one_trace_per_policy() {
    let dir = std::env::temp_dir().join(format!("replisim-sweep-{}", std::process::id()));
    let base = dir.join("run.jsonl");
    let config = sweep_config(&base);

    let summaries =
        compare_policies(&config, &["round_robin", "least_load", "round_robin"]).unwrap();
    let names: Vec<&str> = summaries.iter().map(|s| s.policy.as_str()).collect();
    assert_eq!(names, vec!["round_robin", "least_load"]);

    for summary in &summaries {
        let path = policy_output_path(&base, &summary.policy);
        assert!(path.exists(), "missing trace {}", path.display());
        let replayed = summarize_trace(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(&replayed, summary);
        assert_eq!(summary.ticks, 41);
        assert_eq!(
            summary.admitted,
            summary.completed + summary.failed + summary.in_flight
        );
    }
    assert!(!base.exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_compare_matches_single_runs() {
    let dir = std::env::temp_dir().join(format!("replisim-sweep-single-{}", std::process::id()));
    let base = dir.join("run.jsonl");
    let config = sweep_config(&base);

    let swept = compare_policies(&config, &["least_load"]).unwrap();

    let mut single = config.clone();
    single.load_balancer.policy = "least_load".to_string();
    single.simulation.output_path = Some(dir.join("single.jsonl"));
    let alone = replisim_core::run_simulation(&single).unwrap();

    assert_eq!(swept, vec![alone]);
    std::fs::remove_dir_all(&dir).unwrap();
}
