//! Integration tests for config parsing against the shipped config.toml.

use std::path::PathBuf;
use std::time::Duration;

use arachne_cdl_core::config::{ChoiceValue, TimeUnit};
use arachne_cdl_core::{Config, DownloadType};

fn project_root() -> PathBuf {
    // crates/arachne-cdl-core/ -> project root
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

#[test]
fn test_load_real_config() {
    let config_path = project_root().join("config.toml");

    let config = Config::load(&config_path).expect("Failed to load config.toml");

    assert_eq!(config.download.download_type(), Some(DownloadType::NetworkManager));
    assert!(config.download.auto);
    assert_eq!(config.download.initial_delay(), Some(Duration::from_secs(300)));
    assert_eq!(config.download.interval_duration(), Some(Duration::from_secs(3600)));
    assert!(config.allow.wifi && config.allow.wired && config.allow.vpn);
    assert!(config.allow.connections.is_empty());
}

#[test]
fn test_real_config_matches_builtin_defaults() {
    let config = Config::load(&project_root().join("config.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_real_config_validates() {
    let config = Config::load(&project_root().join("config.toml")).unwrap();

    config.validate().expect("Shipped config.toml should be valid");
    assert!(config.warnings().is_empty());
}

#[test]
fn test_config_summary() {
    let config = Config::load(&project_root().join("config.toml")).unwrap();

    let summary = config.summary();

    assert!(summary.contains("Server:"));
    assert!(summary.contains("Download:"));
    assert!(summary.contains("Allow:"));
    assert!(summary.contains("timeout: 6s"));
}

#[test]
fn test_find_and_load_with_explicit_path() {
    let config_path = project_root().join("config.toml");

    let result = Config::find_and_load(Some(&config_path)).unwrap();

    assert!(!result.used_defaults);
    assert_eq!(result.source, Some(config_path));
    result.config.validate().expect("Loaded config should be valid");
}

#[test]
fn test_find_and_load_explicit_missing_fails() {
    let missing_path = PathBuf::from("/nonexistent/arachne-cdl/config.toml");
    assert!(Config::find_and_load(Some(&missing_path)).is_err());
}

#[test]
fn test_broken_config_returns_error_not_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{{").unwrap();

    assert!(Config::load(&path).is_err(), "Broken config should fail to load");
}

#[test]
fn test_partial_user_config_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
            [server]
            url = "https://vpn-admin.example.org/arachne/"

            [allow]
            wifi = false
            connections = ["0b4e5f43-5f55-4b4b-9cc4-6bc8a4cf1b6a"]
        "#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();

    assert_eq!(config.admin_server_url(), "https://vpn-admin.example.org/arachne");
    assert!(!config.allow.wifi);
    assert!(config.allow.wired);
    assert_eq!(config.allow.connections.len(), 1);
    assert_eq!(config.server.timeout_secs, 6);
    assert_eq!(
        config.user_config_url(DownloadType::NetworkManager),
        "https://vpn-admin.example.org/arachne/api/openvpn/user_config?format=json"
    );
}

#[test]
fn test_legacy_index_values_load() {
    let config = Config::load_with_defaults(
        r#"
            [download]
            type = 1
            delay_unit = 0
            interval = 2
            interval_unit = 2
        "#,
    )
    .unwrap();

    assert_eq!(config.download.download_type(), Some(DownloadType::Ovpn));
    assert_eq!(TimeUnit::resolve(&config.download.delay_unit), Some(TimeUnit::Seconds));
    assert_eq!(config.download.interval_duration(), Some(Duration::from_secs(7200)));
    config.validate().unwrap();
}

#[test]
fn test_unknown_unit_is_a_warning_not_an_error() {
    let config = Config::load_with_defaults(
        r#"
            [download]
            interval_unit = "fortnights"
        "#,
    )
    .unwrap();

    assert_eq!(config.download.interval_unit, ChoiceValue::from("fortnights"));
    config.validate().expect("unknown unit should still validate");
    let warnings = config.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("download.interval_unit"));
}

#[test]
fn test_validation_rejects_out_of_range_timeout() {
    let config = Config::load_with_defaults("[server]\ntimeout_secs = 30\n").unwrap();

    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("server.timeout_secs"), "got: {}", err);
}

#[test]
fn test_validation_rejects_unknown_download_type() {
    let config = Config::load_with_defaults("[download]\ntype = \"pptp\"\n").unwrap();

    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("download.type"), "got: {}", err);
}

#[test]
fn test_unknown_keys_are_rejected() {
    assert!(Config::load_with_defaults("[server]\nproxy = \"http://p\"\n").is_err());
}
