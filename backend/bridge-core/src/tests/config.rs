use crate::config::{BridgeConfig, DEFAULT_READY_METHOD};
use crate::error::config::ConfigError;

use tempfile::TempDir;

#[test]
fn given_missing_file_when_loading_then_returns_defaults() {
    let dir = TempDir::new().unwrap();

    let config = BridgeConfig::load(dir.path()).unwrap();

    assert_eq!(config, BridgeConfig::default());
    assert_eq!(config.router.ready_method, DEFAULT_READY_METHOD);
    assert_eq!(config.router.dedup_window, 256);
}

/// **VALUE**: Saved config round-trips through disk with partial sections defaulted.
#[test]
fn given_saved_config_when_loading_then_values_are_preserved() {
    let dir = TempDir::new().unwrap();
    let mut config = BridgeConfig::default();
    config.router.dedup_window = 32;
    config.server.port = 0;

    config.save(dir.path()).unwrap();
    let loaded = BridgeConfig::load(dir.path()).unwrap();

    assert_eq!(loaded, config);
    assert!(!dir.path().join("bridge.toml.tmp").exists());
}

#[test]
fn given_partial_toml_when_loading_then_missing_fields_use_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("bridge.toml"),
        "[router]\ndedup_window = 8\n",
    )
    .unwrap();

    let config = BridgeConfig::load(dir.path()).unwrap();

    assert_eq!(config.router.dedup_window, 8);
    assert_eq!(config.router.ready_method, DEFAULT_READY_METHOD);
    assert_eq!(config.push.health_failure_threshold, 3);
}

#[test]
fn given_malformed_toml_when_loading_then_returns_parse_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bridge.toml"), "[router\n").unwrap();

    let result = BridgeConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn given_malformed_toml_when_loading_then_message_names_bridge_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.toml");
    std::fs::write(&path, "[router\n").unwrap();

    let message = BridgeConfig::load(dir.path()).unwrap_err().to_string();

    assert!(message.starts_with("Malformed bridge.toml at "), "{message}");
    assert!(message.contains(&path.display().to_string()), "{message}");
}

#[test]
fn given_zero_dedup_window_when_validating_then_fails() {
    let mut config = BridgeConfig::default();
    config.router.dedup_window = 0;

    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError { .. })
    ));
}

#[test]
fn given_blank_ready_method_when_validating_then_fails() {
    let mut config = BridgeConfig::default();
    config.router.ready_method = "  ".to_string();

    let err = config.validate().unwrap_err();

    assert!(err.to_string().contains("ready_method"));
}

#[test]
fn given_future_version_when_validating_then_fails() {
    let config = BridgeConfig {
        version: 99,
        ..BridgeConfig::default()
    };

    assert!(config.validate().is_err());
}
