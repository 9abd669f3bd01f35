//! Config and log directory resolution.
//!
//! Environment overrides win over the platform defaults so tests and
//! supervisors can point the host at a scratch directory.

use crate::error::HostError;

use bridge_core::BridgeConfig;

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::PathBuf;

pub const CONFIG_DIR_ENV: &str = "BRIDGE_CONFIG_DIR";
pub const LOG_DIR_ENV: &str = "BRIDGE_LOG_DIR";

pub fn config_dir() -> Result<PathBuf, HostError> {
    match env::var_os(CONFIG_DIR_ENV) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(BridgeConfig::default_dir()?),
    }
}

/// `<data_local_dir>/bridge/logs` unless overridden.
pub fn log_dir() -> Result<PathBuf, HostError> {
    if let Some(dir) = env::var_os(LOG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    dirs::data_local_dir()
        .map(|dir| dir.join("bridge").join("logs"))
        .ok_or_else(|| HostError::Host {
            message: "Could not determine a log directory".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}
