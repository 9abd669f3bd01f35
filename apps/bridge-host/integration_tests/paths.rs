use bridge_host::paths::{CONFIG_DIR_ENV, LOG_DIR_ENV, config_dir, log_dir};

use bridge_core::BridgeConfig;

use serial_test::serial;
use tempfile::TempDir;

/// **VALUE**: The environment override lets a supervisor point the host at its own config.
#[test]
#[serial]
fn given_config_dir_override_when_loading_then_config_comes_from_override() {
    // GIVEN: A config saved into a scratch directory
    let temp_dir = TempDir::new().unwrap();
    let mut config = BridgeConfig::default();
    config.server.port = 0;
    config.router.dedup_window = 16;
    config.save(temp_dir.path()).unwrap();

    // WHEN: The override points at it
    // SAFETY: environment access is serialized across these tests.
    unsafe { std::env::set_var(CONFIG_DIR_ENV, temp_dir.path()) };
    let resolved = config_dir();
    unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

    // THEN: Loading from the resolved directory yields the saved config
    let resolved = resolved.expect("Config dir should resolve");
    assert_eq!(resolved, temp_dir.path());
    assert_eq!(BridgeConfig::load(&resolved).unwrap(), config);
}

#[test]
#[serial]
fn given_log_dir_override_then_it_wins_over_platform_default() {
    unsafe { std::env::set_var(LOG_DIR_ENV, "/tmp/bridge-host-logs") };
    let resolved = log_dir();
    unsafe { std::env::remove_var(LOG_DIR_ENV) };

    assert_eq!(
        resolved.unwrap(),
        std::path::PathBuf::from("/tmp/bridge-host-logs")
    );
}
