//! End-to-end inspection tests
//!
//! Loads configuration and documents from disk, runs them through the
//! Inspector and checks the serialized report.

use bridge_cli::{Assignment, CliError, Inspector};
use serde_json::{json, Value};
use std::time::Duration;
use value_bridge::BridgeConfig;

fn inspect_file(config: BridgeConfig, document: &str, sets: &[&str], root: bool) -> Value {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    std::fs::write(&path, document).unwrap();

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let assignments: Vec<Assignment> = sets.iter().map(|s| Assignment::parse(s).unwrap()).collect();
    let report = Inspector::new(config)
        .inspect(&document, &assignments, root, Some(Duration::ZERO))
        .unwrap();
    serde_json::to_value(&report).unwrap()
}

/// Test: a nested document with writes and a root produces a full report
#[test]
fn test_report_from_file() {
    let report = inspect_file(
        BridgeConfig::default(),
        r#"{"a": 1, "tags": ["x", "y"]}"#,
        &["b=2", "name=ada"],
        true,
    );

    assert_eq!(report["context"], json!(1));
    assert_eq!(report["kind"], json!("cell"));
    assert_eq!(
        report["value"],
        json!({"a": 1, "tags": ["x", "y"], "b": 2, "name": "ada"})
    );
    assert_eq!(report["swaps"], json!(2));
    assert_eq!(report["stats"]["root_count"], json!(1));
    assert_eq!(report["leaks"]["threshold_ms"], json!(0));
    assert_eq!(report["leaks"]["warnings"].as_array().unwrap().len(), 1);
}

/// Test: without rooting nothing is reported as leaked
#[test]
fn test_unrooted_report_has_no_leaks() {
    let report = inspect_file(BridgeConfig::default(), r#"{"a": true}"#, &[], false);
    assert_eq!(report["stats"]["root_count"], json!(0));
    assert!(report["leaks"]["warnings"].as_array().unwrap().is_empty());
    assert_eq!(report["swaps"], json!(0));
}

/// Test: configuration loaded from disk changes array layout
#[test]
fn test_config_file_controls_array_layout() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("bridge.json");
    std::fs::write(&config_path, r#"{"dense_array_threshold": 2}"#).unwrap();
    let config = BridgeConfig::from_json_file(&config_path).unwrap();

    let dense = inspect_file(config.clone(), "[true]", &[], false);
    assert_eq!(dense["kind"], json!("list"));
    assert_eq!(dense["value"], json!([true]));

    let sparse = inspect_file(config, "[true, false, null]", &[], false);
    assert_eq!(sparse["kind"], json!("map"));
    assert_eq!(sparse["value"], json!([[0, true], [1, false], [2, null]]));
}

/// Test: invalid configuration and writes into non-objects are rejected
#[test]
fn test_rejected_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("bridge.json");
    std::fs::write(&config_path, r#"{"max_conversion_depth": 0}"#).unwrap();
    assert!(BridgeConfig::from_json_file(&config_path).is_err());

    let err = Inspector::new(BridgeConfig::default())
        .inspect(&json!("text"), &[Assignment::parse("a=1").unwrap()], false, None)
        .unwrap_err();
    assert!(matches!(err, CliError::NotAnObject("string")));
}
