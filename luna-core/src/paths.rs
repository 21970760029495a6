//! Well-known host directories
//!
//! Platform-native locations for plug-ins and persisted configuration,
//! with a dotted home fallback when the platform reports none.

use std::path::PathBuf;

const APPLICATION_DIR: &str = "luna";

/// Default directory scanned for plug-in candidates
pub fn plugin_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APPLICATION_DIR))
        .unwrap_or_else(fallback_dir)
        .join("plugins")
}

/// Default base directory for persisted configurations
pub fn configuration_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APPLICATION_DIR))
        .unwrap_or_else(fallback_dir)
        .join("configuration")
}

fn fallback_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!(".{APPLICATION_DIR}"))
}
