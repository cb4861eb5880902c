/// Integration tests for the JSONL trace.
use indicatif::ProgressBar;
use replisim_core::config::SimConfig;
use replisim_core::engine::SimulationEngine;
use replisim_core::metrics::summarize_trace;
use replisim_core::trace::{read_trace, TraceRecord, TraceWriter};
use serde_json::Value;
use std::io::BufReader;

fn fixed_config(policy: &str) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
max_tick = 60
output_path = "target/trace.jsonl"
with_pbar = false

[load_balancer]
type = "{policy}"

[[clients]]
type = "fixed_traffic"
location = "us"
traffics = [4, 1, "idle", 7, 2]
traffic_expired_time = 6

[[clients]]
type = "fixed_traffic"
location = "asia"
traffics = [3, "idle", 9]
period_tick = 2
traffic_expired_time = 12

[[replicas]]
location = "us"
accelerator = "T4"

[[replicas]]
type = "fixed_capacity"
location = "asia"
capacity = 2
"#
    ))
    .unwrap()
}

fn random_config(seed: u64) -> SimConfig {
    SimConfig::from_str(&format!(
        r#"
[simulation]
max_tick = 80
output_path = "target/trace.jsonl"
with_pbar = false
seed = {seed}

[[clients]]
type = "random_send_request"
location = "us"
prob = 0.6
workload = 3
traffic_expired_time = 10

[[clients]]
type = "random_choice_workload"
location = "asia"
workload_candidates = [1, 5, 9]

[[replicas]]
location = "us"
accelerator = "A100"
"#
    ))
    .unwrap()
}

fn trace_bytes(config: &SimConfig) -> Vec<u8> {
    let mut engine = SimulationEngine::from_config(config).unwrap();
    let mut writer = TraceWriter::new(Vec::new());
    engine.run(&mut writer, &ProgressBar::hidden()).unwrap();
    writer.into_inner().unwrap()
}

#[test]
fn test_fixed_sources_give_byte_identical_traces() {
    for policy in ["round_robin", "least_load"] {
        let config = fixed_config(policy);
        assert_eq!(trace_bytes(&config), trace_bytes(&config), "policy {}", policy);
    }
}

#[test]
fn test_seeded_sources_are_reproducible() {
    assert_eq!(trace_bytes(&random_config(9)), trace_bytes(&random_config(9)));
    assert_ne!(trace_bytes(&random_config(9)), trace_bytes(&random_config(10)));
}

#[test]
fn test_record_sequence() {
    let bytes = trace_bytes(&fixed_config("round_robin"));
    let records = read_trace(BufReader::new(bytes.as_slice())).unwrap();
    assert_eq!(records.len(), 1 + 2 * 61);

    match &records[0] {
        TraceRecord::MetaInfo(meta) => {
            assert_eq!(meta.clients.as_ref().map(Vec::len), Some(2));
            assert_eq!(meta.lb.as_ref().map(|lb| lb.num_replicas), Some(2));
            assert!(meta.new_traffic.is_none());
        }
        other => panic!("Expected header, got {:?}", other),
    }
    for (i, pair) in records[1..].chunks(2).enumerate() {
        match (&pair[0], &pair[1]) {
            (TraceRecord::TickInfo(info), TraceRecord::MetaInfo(meta)) => {
                assert_eq!(info.tick, i as u64);
                assert!(meta.new_traffic.is_some());
                assert!(meta.clients.is_none());
            }
            other => panic!("Unexpected records at tick {}: {:?}", i, other),
        }
    }
}

#[test]
fn test_tick_info_json_shape() {
    let bytes = trace_bytes(&fixed_config("round_robin"));
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let header = &lines[0];
    assert_eq!(header["type"], "meta_info");
    assert_eq!(header["lb"]["name"], "round_robin");
    assert_eq!(header["lb"]["replicas"][0]["location"], "us");

    let tick0 = &lines[1];
    assert_eq!(tick0["type"], "tick_info");
    assert_eq!(tick0["tick"], 0);
    assert!(tick0["finished_traffics"].is_array());
    assert_eq!(tick0["lb_info"]["idx"], 0);
    assert_eq!(tick0["lb_info"]["replicas"][0]["accelerator"], "T4");
    assert!(tick0["lb_info"]["replicas"][1].get("accelerator").is_none());

    let arrivals = &lines[2]["new_traffic"];
    assert_eq!(arrivals.as_array().map(Vec::len), Some(2));
    assert_eq!(arrivals[0]["start_time"], 0);
    assert_eq!(arrivals[0]["expired_time"], 6);
    assert_eq!(arrivals[1]["client_location"], "asia");

    for line in lines.iter().filter(|l| l["type"] == "tick_info") {
        for item in line["finished_traffics"].as_array().unwrap() {
            let item = item.as_array().unwrap();
            assert_eq!(item.len(), 3);
            if item[2] == Value::Bool(true) {
                assert!(item[1].is_null());
            } else {
                assert!(item[1].is_u64());
            }
        }
    }
}

#[test]
fn test_trace_summary_matches_live_summary() {
    let config = fixed_config("least_load");
    let mut engine = SimulationEngine::from_config(&config).unwrap();
    let mut writer = TraceWriter::new(Vec::new());
    let live = engine.run(&mut writer, &ProgressBar::hidden()).unwrap();
    let bytes = writer.into_inner().unwrap();

    let replayed = summarize_trace(BufReader::new(bytes.as_slice())).unwrap();
    assert_eq!(replayed, live);
}

#[test]
fn test_trace_file_written_to_disk() {
    let dir = std::env::temp_dir().join(format!("replisim-trace-{}", std::process::id()));
    let mut config = fixed_config("round_robin");
    config.simulation.output_path = Some(dir.join("nested").join("run.jsonl"));

    let summary = replisim_core::run_simulation(&config).unwrap();
    let records =
        replisim_core::trace::load_trace(config.output_path().unwrap()).unwrap();
    assert_eq!(records.len(), 1 + 2 * 61);
    assert_eq!(summary.ticks, 61);
    std::fs::remove_dir_all(&dir).unwrap();
}
