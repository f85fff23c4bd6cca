//! Smoke test for the scoreboard harness.
//!
//! It writes the gold fixture, a minimal plan pointing at it, invokes the
//! scoreboard, and validates the metrics line.

use std::fs; // read/write files
use std::process::Command; // spawn

use assert_cmd::prelude::*; // assert helpers
use serde_json::Value; // parse JSONL lines

mod util; // reuse corpus fixture helpers
use util::gold_fixture;

fn run_plan(plan: &str) -> Vec<Value>
{
    let tmp = gold_fixture();

    // Persist the plan next to the fixture
    let plan_path = tmp
        .path()
        .join("plan.json");
    fs::write(&plan_path, plan).expect("write plan");

    let out_path = tmp
        .path()
        .join("scoreboard.jsonl");

    Command::cargo_bin("scoreboard")
        .expect("bin")
        .current_dir(tmp.path())
        .args([
            "--plan",
            plan_path
                .to_str()
                .unwrap(),
            "--out",
            out_path
                .to_str()
                .unwrap(),
        ])
        .assert()
        .success();

    let text = fs::read_to_string(&out_path).expect("read jsonl");
    text.lines()
        .map(|line| serde_json::from_str(line).expect("json"))
        .collect()
}

#[test]
fn scoreboard_runs_and_emits_metrics()
{
    let rows = run_plan(
        r#"
    {
      "scenarios": [
        { "name": "pairs_twice", "scenario": "scenario.json", "corpus": "corpus.json", "runs": 2 }
      ]
    }"#,
    );
    assert_eq!(rows.len(), 1);
    let v = &rows[0];

    assert_eq!(v["name"], "pairs_twice", "scenario name should match");
    assert_eq!(v["documents"], 6);
    assert_eq!(v["clusters"], 3);
    assert_eq!(v["pairwise_f1"], 1.0, "gold corpus should score perfectly");
    assert_eq!(v["over_merge_rate"], 0.0);
    assert_eq!(v["missing_predictions"], 0);
    assert!(
        v["deterministic"]
            .as_bool()
            .unwrap(),
        "repeated runs should agree"
    );
}

#[test]
fn scoreboard_defaults_name_and_runs()
{
    let rows = run_plan(
        r#"
    {
      "scenarios": [
        { "scenario": "scenario.json", "corpus": "corpus.json" },
        { "name": "single", "scenario": "scenario.json", "corpus": "corpus.json", "runs": 1 }
      ]
    }"#,
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "three-pairs", "falls back to the scenario's own name");
    assert_eq!(rows[1]["name"], "single");
    assert!(
        rows[1]["deterministic"]
            .as_bool()
            .unwrap(),
        "a single run is trivially deterministic"
    );
}

#[test]
fn scoreboard_rejects_missing_plan()
{
    let tmp = gold_fixture();
    Command::cargo_bin("scoreboard")
        .expect("bin")
        .current_dir(tmp.path())
        .args(["--plan", "nope.json", "--out", "out.jsonl"])
        .assert()
        .failure();
}
