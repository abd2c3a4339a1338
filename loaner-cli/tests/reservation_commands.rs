//! Integration tests for `reserve`, `complete` and `cancel`.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_reserve_prints_reservation_id() {
    let env = TestEnv::initialized();
    let device = env.add_device("high");
    let ada = env.add_requester("Ada", "high");

    env.command()
        .args([
            "reserve",
            "--device",
            &device.to_string(),
            "--requester",
            &ada.to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\d+\n$").unwrap());

    let active = env.list_json(&[]);
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["device_id"], device);
    assert_eq!(active[0]["requester_id"], ada);
    assert_eq!(active[0]["status"], "active");
}

#[test]
fn test_reserve_loaned_device_fails() {
    let env = TestEnv::initialized();
    let device = env.add_device("low");
    let ada = env.add_requester("Ada", "low");
    let ken = env.add_requester("Ken", "low");
    env.reserve(device, ada);

    env.command()
        .args([
            "reserve",
            "--device",
            &device.to_string(),
            "--requester",
            &ken.to_string(),
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_reserve_second_device_for_holder_fails() {
    let env = TestEnv::initialized();
    let first = env.add_device("high");
    let second = env.add_device("high");
    let ada = env.add_requester("Ada", "high");
    env.reserve(first, ada);

    env.command()
        .args([
            "reserve",
            "--device",
            &second.to_string(),
            "--requester",
            &ada.to_string(),
        ])
        .assert()
        .code(1);
}

#[test]
fn test_reserve_tier_mismatch_fails() {
    let env = TestEnv::initialized();
    let device = env.add_device("low");
    let ada = env.add_requester("Ada", "high");

    env.command()
        .args([
            "reserve",
            "--device",
            &device.to_string(),
            "--requester",
            &ada.to_string(),
        ])
        .assert()
        .code(1);
    assert!(env.list_json(&[]).as_array().unwrap().is_empty());
}

#[test]
fn test_complete_frees_device() {
    let env = TestEnv::initialized();
    let device = env.add_device("high");
    let ada = env.add_requester("Ada", "high");
    let loan = env.reserve(device, ada);

    env.command()
        .args(["complete", &loan.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Reservation {loan} completed")));

    assert!(env.list_json(&[]).as_array().unwrap().is_empty());
    let history = env.list_json(&["--all"]);
    assert_eq!(history[0]["status"], "completed");

    // The device can be loaned again
    env.reserve(device, ada);
}

#[test]
fn test_complete_twice_is_a_noop() {
    let env = TestEnv::initialized();
    let device = env.add_device("high");
    let ada = env.add_requester("Ada", "high");
    let loan = env.reserve(device, ada);
    env.run(&["complete", &loan.to_string()]);

    env.command()
        .args(["complete", &loan.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("already completed"));
}

#[test]
fn test_cancel_after_complete_is_invalid_transition() {
    let env = TestEnv::initialized();
    let device = env.add_device("low");
    let ken = env.add_requester("Ken", "low");
    let loan = env.reserve(device, ken);
    env.run(&["complete", &loan.to_string()]);

    env.command()
        .args(["cancel", &loan.to_string()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid transition"));
}

#[test]
fn test_return_hands_device_to_next_in_queue() {
    let env = TestEnv::initialized();
    let device = env.add_device("high");
    let ada = env.add_requester("Ada", "high");
    let bob = env.add_requester("Bob", "high");
    let loan = env.reserve(device, ada);
    assert_eq!(env.run(&["queue", "add", "--requester", &bob.to_string()]), "queued high 0");

    env.command()
        .args(["cancel", &loan.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Device {device} assigned to requester {bob}"
        )));

    let active = env.list_json(&[]);
    assert_eq!(active.as_array().unwrap().len(), 1);
    assert_eq!(active[0]["requester_id"], bob);
    assert!(env.queue_json().as_array().unwrap().is_empty());
}

#[test]
fn test_complete_unknown_reservation_is_not_found() {
    let env = TestEnv::initialized();
    env.command()
        .args(["complete", "42"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("not found"));
}
