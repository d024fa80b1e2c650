// Tests for settings loading and overrides

use std::fs;
use std::time::Duration;

use sysdash::core::config::Settings;
use sysdash::DashError;
use tempfile::TempDir;

#[test]
fn test_missing_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings = Settings::load(Some(temp_dir.path().join("nope.json").as_path())).unwrap();

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.refresh_interval(), Duration::from_secs(45));
    assert_eq!(settings.cache_ttl(), Duration::from_secs(45));
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "cache_ttl_secs": 120 }"#).unwrap();

    let settings = Settings::load(Some(path.as_path())).unwrap();
    assert_eq!(settings.cache_ttl_secs, 120);
    assert_eq!(settings.refresh_interval_secs, 45);
    assert_eq!(settings.source_budget_secs, 15);
}

#[test]
fn test_malformed_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ refresh_interval_secs: ").unwrap();

    let err = Settings::load(Some(path.as_path())).unwrap_err();
    assert!(matches!(err, DashError::Config(_)));
}

#[test]
fn test_empty_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "  \n").unwrap();

    assert_eq!(Settings::load(Some(path.as_path())).unwrap(), Settings::default());
}

#[test]
fn test_overrides_win_over_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "refresh_interval_secs": 10, "cache_ttl_secs": 30 }"#).unwrap();

    let settings = Settings::load(Some(path.as_path()))
        .unwrap()
        .with_overrides(Some(5), None)
        .unwrap();
    assert_eq!(settings.refresh_interval_secs, 5);
    assert_eq!(settings.cache_ttl_secs, 30);
}

#[test]
fn test_ttl_is_independent_of_interval() {
    let settings = Settings::default().with_overrides(Some(5), Some(300)).unwrap();
    assert_eq!(settings.refresh_interval(), Duration::from_secs(5));
    assert_eq!(settings.cache_ttl(), Duration::from_secs(300));
}

#[test]
fn test_zero_interval_rejected() {
    assert!(Settings::default().with_overrides(Some(0), None).is_err());

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "tool_timeout_secs": 0 }"#).unwrap();
    assert!(Settings::load(Some(path.as_path())).is_err());
}
