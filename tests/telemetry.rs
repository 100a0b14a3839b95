#[path = "common/mod.rs"]
mod common;

use std::fs;
use std::sync::Arc;

use sendguard::bridge::ScriptedItem;
use sendguard::{build_state, register_handlers, AppConfig, ACTION_ID, ON_SEND_ID};

fn read_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .expect("log file readable")
        .lines()
        .map(|l| serde_json::from_str(l).expect("line parses as JSON"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn records_one_line_per_decision() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("decisions.log");
    let config = AppConfig {
        log_file: Some(log_path.to_string_lossy().to_string()),
        ..AppConfig::default()
    };
    let state = build_state(&config);
    let d = register_handlers(&state).unwrap();

    for body in ["please login", "away", "nothing to see"] {
        common::send(&d, body).await;
    }
    d.dispatch(ON_SEND_ID, Arc::new(ScriptedItem::failing("x")))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    d.dispatch(ACTION_ID, Arc::new(ScriptedItem::default()))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(state.telemetry.lines_total(), 5);
    let lines = read_lines(&log_path);
    assert_eq!(lines.len(), 5);
    for v in &lines {
        for key in ["schemaVersion", "ts", "handler", "outcome", "latencyMs"] {
            assert!(v.get(key).is_some(), "missing telemetry field {key}");
        }
    }

    assert_eq!(lines[0]["rule"], "login");
    assert_eq!(lines[0]["outcome"], "block");
    assert_eq!(lines[0]["allowEvent"], false);

    assert_eq!(lines[1]["rule"], "away");
    assert_eq!(lines[1]["outcome"], "delay");
    assert_eq!(lines[1]["delayMs"], 4000);
    assert_eq!(lines[1]["allowEvent"], true);

    assert!(lines[2]["rule"].is_null());
    assert_eq!(lines[2]["outcome"], "allow");

    assert_eq!(lines[3]["outcome"], "failClosed");
    assert_eq!(lines[3]["allowEvent"], false);

    assert_eq!(lines[4]["handler"], "action");
    assert_eq!(lines[4]["outcome"], "done");
    assert!(lines[4]["allowEvent"].is_null());
}

#[tokio::test]
async fn unwritable_log_file_disables_telemetry() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        log_file: Some(dir.path().join("missing/dir/log").to_string_lossy().to_string()),
        ..AppConfig::default()
    };
    let state = build_state(&config);
    assert!(!state.telemetry.is_enabled());
    let d = register_handlers(&state).unwrap();
    assert!(common::send(&d, "hello").await.allow_event);
}
