use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SUITE: &str = "group.test.bettr";

// ── Fixture helpers ────────────────────────────────────────────────────────

/// Activity dump with one segment: Social (Instagram 1h, unnamed app 30m)
/// and Productivity (Mail 15m).
const SEGMENTS: &str = r#"[
    {
        "totalActivityDuration": 6300,
        "categories": [
            {
                "displayName": "Social",
                "totalActivityDuration": 5400,
                "applications": [
                    { "displayName": "Instagram", "bundleIdentifier": "com.burbn.instagram", "totalActivityDuration": 3600 },
                    { "totalActivityDuration": 1800 }
                ]
            },
            {
                "displayName": "Productivity",
                "totalActivityDuration": 900,
                "applications": [
                    { "bundleIdentifier": "com.apple.mobilemail", "totalActivityDuration": 900 }
                ]
            }
        ]
    }
]"#;

fn suite_dir(tmp: &Path) -> PathBuf {
    tmp.join("store").join(SUITE)
}

fn write_segments(tmp: &Path) -> PathBuf {
    let path = tmp.join("segments.json");
    fs::write(&path, SEGMENTS).unwrap();
    path
}

fn seed_key(tmp: &Path, key: &str, content: &str) {
    let dir = suite_dir(tmp);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(key), content).unwrap();
}

/// Command isolated from the real config and store directories.
fn cmd_with_store(tmp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bettr").unwrap();
    cmd.env("HOME", tmp)
        .env("XDG_CONFIG_HOME", tmp.join(".config"))
        .env("XDG_DATA_HOME", tmp.join(".local/share"))
        .env_remove("BETTR_STORE_DIR")
        .env_remove("RUST_LOG")
        .arg("--store")
        .arg(tmp.join("store"))
        .arg("--suite")
        .arg(SUITE);
    cmd
}

// ── Help ───────────────────────────────────────────────────────────────────

#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("bettr").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("progress"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("bettr").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bettr"));
}

#[test]
fn test_report_command_help() {
    let mut cmd = Command::cargo_bin("bettr").unwrap();
    cmd.args(["report", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--segments"));
}

// ── Report ─────────────────────────────────────────────────────────────────

#[test]
fn test_report_writes_history_and_snapshot() {
    let tmp = TempDir::new().unwrap();
    let segments = write_segments(tmp.path());

    cmd_with_store(tmp.path())
        .args(["report", "--json", "--segments"])
        .arg(&segments)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"totalHours\": 1.75"))
        .stdout(predicate::str::contains("\"Instagram\": 1.0"))
        .stdout(predicate::str::contains("\"Unknown\": 0.5"))
        .stdout(predicate::str::contains("\"com.apple.mobilemail\": 0.25"))
        .stdout(predicate::str::contains("\"Social\": 1.5"))
        .stdout(predicate::str::contains("\"dailyHistory\""));

    assert!(suite_dir(tmp.path()).join("dailyScreenTime").exists());
    assert!(suite_dir(tmp.path()).join("screentime_latest").exists());

    cmd_with_store(tmp.path())
        .args(["history", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Instagram\": 1.0"));
}

#[test]
fn test_report_rerun_keeps_single_day() {
    let tmp = TempDir::new().unwrap();
    let segments = write_segments(tmp.path());

    for _ in 0..2 {
        cmd_with_store(tmp.path())
            .args(["report", "--segments"])
            .arg(&segments)
            .assert()
            .success();
    }

    let history = fs::read_to_string(suite_dir(tmp.path()).join("dailyScreenTime")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&history).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
}

#[test]
fn test_report_replaces_corrupt_history() {
    let tmp = TempDir::new().unwrap();
    let segments = write_segments(tmp.path());
    seed_key(tmp.path(), "dailyScreenTime", "{ not a list");

    cmd_with_store(tmp.path())
        .args(["report", "--segments"])
        .arg(&segments)
        .assert()
        .success()
        .stdout(predicate::str::contains("History: 1 days"));
}

#[test]
fn test_report_folds_legacy_snapshots() {
    let tmp = TempDir::new().unwrap();
    let segments = write_segments(tmp.path());
    seed_key(
        tmp.path(),
        "screentime_1735689600",
        r#"{"date":"2020-01-01","totalHours":3.0,"totalSeconds":10800,"appUsage":{"Safari":3.0},"categoryUsage":{}}"#,
    );

    cmd_with_store(tmp.path())
        .args(["report", "--segments"])
        .arg(&segments)
        .assert()
        .success();

    cmd_with_store(tmp.path())
        .args(["history", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"date\": \"2020-01-01\""))
        .stdout(predicate::str::contains("\"Safari\": 3.0"));
}

#[test]
fn test_report_missing_segments_file_fails() {
    let tmp = TempDir::new().unwrap();

    cmd_with_store(tmp.path())
        .args(["report", "--segments"])
        .arg(tmp.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not read"));
}

// ── Inspection ─────────────────────────────────────────────────────────────

#[test]
fn test_history_empty_store() {
    let tmp = TempDir::new().unwrap();

    cmd_with_store(tmp.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No daily history stored"));
}

#[test]
fn test_latest_without_snapshot() {
    let tmp = TempDir::new().unwrap();

    cmd_with_store(tmp.path())
        .args(["latest", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("null"));
}

#[test]
fn test_legacy_listing() {
    let tmp = TempDir::new().unwrap();
    seed_key(
        tmp.path(),
        "screentime_1751328000",
        r#"{"date":"2025-07-01","totalHours":2.0,"totalSeconds":7200,"appUsage":{},"categoryUsage":{}}"#,
    );
    seed_key(tmp.path(), "screentime_1751414400", r#"{"totalHours":1.0}"#);

    cmd_with_store(tmp.path())
        .args(["legacy", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("screentime_1751328000"))
        .stdout(predicate::str::contains("\"date\": \"2025-07-01\""))
        .stdout(predicate::str::contains("\"date\": null"));

    assert!(!suite_dir(tmp.path()).join("screentime_legacy_manifest").exists());

    cmd_with_store(tmp.path())
        .args(["legacy", "--rescan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("screentime_1751414400"));

    assert!(suite_dir(tmp.path()).join("screentime_legacy_manifest").exists());
}

// ── Goal ───────────────────────────────────────────────────────────────────

#[test]
fn test_goal_defaults_to_two_hours() {
    let tmp = TempDir::new().unwrap();

    cmd_with_store(tmp.path())
        .arg("goal")
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily goal: 2h"));
}

#[test]
fn test_goal_set_then_read() {
    let tmp = TempDir::new().unwrap();

    cmd_with_store(tmp.path())
        .args(["goal", "--set", "3.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily goal: 3h 30m"));

    cmd_with_store(tmp.path())
        .args(["goal", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"thresholdHours\": 3.5"));
}

#[test]
fn test_goal_rejects_negative() {
    let tmp = TempDir::new().unwrap();

    cmd_with_store(tmp.path())
        .args(["goal", "--set=-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not save goal"));
}

// ── Progress ───────────────────────────────────────────────────────────────

#[test]
fn test_progress_json() {
    let tmp = TempDir::new().unwrap();
    seed_key(
        tmp.path(),
        "dailyScreenTime",
        r#"[
            {"date":"2025-07-28","totalHours":2.0,"appUsage":{}},
            {"date":"2025-07-29","totalHours":4.0,"appUsage":{}}
        ]"#,
    );
    seed_key(tmp.path(), "goalThreshold", "5.0");

    cmd_with_store(tmp.path())
        .args(["progress", "--date", "2025-07-29", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"progressRatio\": 0.8"))
        .stdout(predicate::str::contains("\"colorBand\": \"yellow\""))
        .stdout(predicate::str::contains("\"exceededGoal\": false"))
        .stdout(predicate::str::contains("\"averageHours\": 3.0"))
        .stdout(predicate::str::contains("\"withinGoal\": true"));
}

#[test]
fn test_progress_table() {
    let tmp = TempDir::new().unwrap();
    seed_key(
        tmp.path(),
        "dailyScreenTime",
        r#"[{"date":"2025-07-29","totalHours":2.5,"appUsage":{}}]"#,
    );

    cmd_with_store(tmp.path())
        .args(["progress", "--date", "2025-07-29"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2h 30m of 2h goal"))
        .stdout(predicate::str::contains("Goal exceeded"))
        .stdout(predicate::str::contains("Week average: 2h 30m"));
}

#[test]
fn test_progress_invalid_date() {
    let tmp = TempDir::new().unwrap();

    cmd_with_store(tmp.path())
        .args(["progress", "--date", "29/07/2025"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}
