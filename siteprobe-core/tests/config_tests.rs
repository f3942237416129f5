// Tests for loading analysis settings from disk

use siteprobe_core::{AnalysisConfig, AnalysisError};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_file() {
    let file = write_config(
        r#"{
            "maxPages": 25,
            "renderConcurrency": 2,
            "maxDepth": 2,
            "resolveAssetSizes": false
        }"#,
    );

    let config = AnalysisConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.max_pages, 25);
    assert_eq!(config.render_concurrency, 2);
    assert_eq!(config.max_depth, 2);
    assert!(!config.resolve_asset_sizes);
    assert_eq!(config.per_page_timeout_ms, 30_000);
}

#[test]
fn test_empty_object_is_default() {
    let file = write_config("{}");
    let config = AnalysisConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config, AnalysisConfig::default());
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_config(r#"{"renderConcurrency": 0}"#);
    let err = AnalysisConfig::from_json_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("renderConcurrency"));
}

#[test]
fn test_malformed_json_is_rejected() {
    let file = write_config("{ maxPages: ");
    assert!(matches!(
        AnalysisConfig::from_json_file(file.path()),
        Err(AnalysisError::InvalidConfig(_))
    ));
}

#[test]
fn test_missing_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let err = AnalysisConfig::from_json_file(&path).unwrap_err();
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn test_config_round_trips_through_json() {
    let config = AnalysisConfig {
        max_pages: 7,
        color_cluster_threshold: 6.5,
        ..AnalysisConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let file = write_config(&json);

    assert_eq!(AnalysisConfig::from_json_file(file.path()).unwrap(), config);
}
