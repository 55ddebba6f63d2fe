use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn short_custom_session() -> &'static str {
    r#"
{
  "version": 1,
  "bell": { "sound": "digital", "repetitions": 2, "interval_ms": 500 },
  "format": {
    "kind": "custom",
    "protected_seconds": 3,
    "speeches": [
      { "title": "Opening", "minutes": 0, "seconds": 10 },
      { "title": "Closing", "minutes": 0, "seconds": 5 }
    ]
  }
}
"#
}

#[test]
fn init_writes_a_loadable_session() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("init")
        .arg("--format")
        .arg("bp")
        .arg("--output")
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("British Parliamentary"));

    let text = fs::read_to_string(&session).expect("session written");
    assert!(text.contains("\"kind\": \"bp\""));

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("queue")
        .arg("--config")
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("Prime Minister"))
        .stdout(predicate::str::contains("alarms: [06:00, 01:00]"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(&session, "keep me").expect("write existing file");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("init")
        .arg("--output")
        .arg(&session)
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --force to overwrite"));
    assert_eq!(fs::read_to_string(&session).expect("read"), "keep me");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("init")
        .arg("--output")
        .arg(&session)
        .arg("--force")
        .assert()
        .success();
    assert!(fs::read_to_string(&session).expect("read").contains("\"wsdc\""));
}

#[test]
fn queue_json_lists_every_speech() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(&session, short_custom_session()).expect("write json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("queue")
        .arg("--config")
        .arg(&session)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"custom-0\""))
        .stdout(predicate::str::contains("\"id\": \"custom-1\""))
        .stdout(predicate::str::contains("\"title\": \"Closing\""));
}

#[test]
fn simulate_reports_alarms_bells_and_finish() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(&session, short_custom_session()).expect("write json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("simulate")
        .arg("--config")
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("[00:03.000] alarm at 00:07 remaining"))
        .stdout(predicate::str::contains("[00:03.500] cue tone:digital"))
        .stdout(predicate::str::contains("[00:10.000] finished"))
        .stdout(predicate::str::contains("6 cues played"));
}

#[test]
fn simulate_all_advances_through_the_queue() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(&session, short_custom_session()).expect("write json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("simulate")
        .arg("--config")
        .arg(&session)
        .arg("--all")
        .assert()
        .success()
        .stdout(predicate::str::contains("[00:10.000] load #1 \"Closing\" 00:05"))
        .stdout(predicate::str::contains("[00:15.000] finished"));
}

#[test]
fn simulate_rejects_speech_index_out_of_range() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(&session, short_custom_session()).expect("write json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("simulate")
        .arg("--config")
        .arg(&session)
        .arg("--speech")
        .arg("7")
        .assert()
        .failure()
        .stderr(predicate::str::contains("speech index 7 is out of range"));
}

#[test]
fn malformed_json_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(&session, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("queue")
        .arg("--config")
        .arg(&session)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn invalid_bell_settings_are_reported() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(
        &session,
        r#"{ "version": 1, "bell": { "interval_ms": 20 }, "format": { "kind": "wsdc" } }"#,
    )
    .expect("write json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("simulate")
        .arg("--config")
        .arg(&session)
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval must be between 100 and 2000 ms"));
}

#[test]
fn run_quits_on_q() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(&session, short_custom_session()).expect("write json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("run")
        .arg("--config")
        .arg(&session)
        .arg("--mute")
        .write_stdin("q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("load #0 \"Opening\" 00:10"));
}

#[test]
fn run_plays_a_test_bell_on_t() {
    let dir = tempdir().expect("tempdir");
    let session = dir.path().join("session.json");
    fs::write(&session, short_custom_session()).expect("write json");

    let mut cmd = cargo_bin_cmd!("debate-timer");
    cmd.arg("run")
        .arg("--config")
        .arg(&session)
        .arg("--mute")
        .write_stdin("t\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("cue tone:digital"))
        .stdout(predicate::str::contains("ringing cleared").not());
}
