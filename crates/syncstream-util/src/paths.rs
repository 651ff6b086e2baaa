//! Default paths for syncstream components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/syncstream/config.toml` or `~/.config/syncstream/config.toml`
//! - Socket: `$XDG_RUNTIME_DIR/syncstream/syncstream.sock` or `/tmp/syncstream-$USER/syncstream.sock`
//! - Data: `$XDG_DATA_HOME/syncstream` or `~/.local/share/syncstream`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const SYNCSTREAM_SOCKET_ENV: &str = "SYNCSTREAM_SOCKET";

/// Environment variable for overriding the data directory
pub const SYNCSTREAM_DATA_DIR_ENV: &str = "SYNCSTREAM_DATA_DIR";

/// Socket filename within the socket directory
const SOCKET_FILENAME: &str = "syncstream.sock";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Application subdirectory name
const APP_DIR: &str = "syncstream";

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$SYNCSTREAM_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/syncstream/syncstream.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/syncstream-$USER/syncstream.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(SYNCSTREAM_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking SYNCSTREAM_SOCKET env var.
/// Used for default values in configs where the env var is checked separately.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$SYNCSTREAM_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/syncstream` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/syncstream` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(SYNCSTREAM_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking SYNCSTREAM_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}
