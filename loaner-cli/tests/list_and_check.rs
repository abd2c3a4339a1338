//! Integration tests for `list` and `check`.

mod common;

use common::TestEnv;
use predicates::prelude::*;

fn seeded() -> (TestEnv, i64, i64) {
    let env = TestEnv::initialized();
    let high = env.add_device("high");
    let low = env.add_device("low");
    let ada = env.add_requester("Ada", "high");
    let ken = env.add_requester("Ken", "low");
    let finished = env.reserve(high, ada);
    env.run(&["complete", &finished.to_string()]);
    let active = env.reserve(low, ken);
    (env, finished, active)
}

#[test]
fn test_list_table_shows_active_only() {
    let (env, finished, active) = seeded();

    let out = env.run(&["list"]);
    let mut lines = out.lines();
    assert_eq!(
        lines.next().unwrap(),
        "ID\tDEVICE_ID\tREQUESTER_ID\tSTATUS\tCREATED_AT\tUPDATED_AT"
    );
    let rows: Vec<_> = lines.collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with(&format!("{active}\t")));
    assert!(!out.contains(&format!("\n{finished}\t")));
}

#[test]
fn test_list_all_includes_history() {
    let (env, finished, active) = seeded();

    let all = env.list_json(&["--all"]);
    let ids: Vec<i64> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![finished, active]);
}

#[test]
fn test_list_filters() {
    let (env, finished, active) = seeded();

    let completed = env.list_json(&["--status", "completed"]);
    assert_eq!(completed.as_array().unwrap().len(), 1);
    assert_eq!(completed[0]["id"], finished);

    let low = env.list_json(&["--tier", "low"]);
    assert_eq!(low.as_array().unwrap().len(), 1);
    assert_eq!(low[0]["id"], active);
}

#[test]
fn test_list_csv() {
    let (env, _, active) = seeded();
    env.command()
        .args(["list", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "id,device_id,requester_id,status,created_at,updated_at\n",
        ))
        .stdout(predicate::str::contains(format!("{active},")));
}

#[test]
fn test_list_format_from_config() {
    let (env, _, _) = seeded();
    std::fs::write(env.data_dir.join("config.yaml"), "output_format: json\n").unwrap();

    let out = env.run(&["list"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert!(parsed.is_array());
}

#[test]
fn test_check_passes_on_consistent_data() {
    let (env, _, _) = seeded();
    env.command()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("no inconsistencies"));
}

#[test]
fn test_check_fails_on_tampered_data() {
    let (env, _, _) = seeded();
    {
        let conn = rusqlite::Connection::open(env.db_path()).unwrap();
        // A loaned device with no active reservation
        conn.execute(
            "UPDATE devices SET state = 'loaned' WHERE tier = 'high'",
            [],
        )
        .unwrap();
    }

    env.command()
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("device"))
        .stderr(predicate::str::contains("found"));
}

#[test]
fn test_check_json_output() {
    let (env, _, _) = seeded();
    let out = env.run(&["check", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed, serde_json::json!([]));
}
