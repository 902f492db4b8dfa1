//! Configuration loading and root folder resolution
//!
//! Every Verdant service stores its SQLite database (and any service-local
//! files) under a single root folder, resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use std::path::PathBuf;

/// Resolve the service root folder.
///
/// `env_var_name` is the service-specific override (e.g. `VERDANT_VD_ROOT`);
/// the TOML lookup reads `root_folder` from the shared config file.
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = config_file_path() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Create the root folder if missing and return the database path inside it.
pub fn ensure_root_folder(root: &PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(root)
        .map_err(|e| Error::Config(format!("Failed to create root folder {:?}: {}", root, e)))?;
    Ok(root.join("verdant.db"))
}

/// Get the configuration file path for the platform
fn config_file_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/verdant/config.toml first, then /etc/verdant/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("verdant").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/verdant/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("verdant").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/verdant (or /var/lib/verdant for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("verdant"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/verdant"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("verdant"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/verdant"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("verdant"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\verdant"))
    } else {
        PathBuf::from("./verdant_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn cli_arg_takes_priority() {
        let root = resolve_root_folder(Some("/tmp/explicit"), "VERDANT_TEST_UNSET_VAR");
        assert_eq!(root, PathBuf::from("/tmp/explicit"));
    }

    // Mutates process environment; serialized to keep parallel test runs
    // from observing the variable mid-flight.
    #[test]
    #[serial]
    fn env_var_beats_default() {
        std::env::set_var("VERDANT_TEST_ROOT_VAR", "/tmp/from-env");
        let root = resolve_root_folder(None, "VERDANT_TEST_ROOT_VAR");
        let resolved = root == PathBuf::from("/tmp/from-env");
        std::env::remove_var("VERDANT_TEST_ROOT_VAR");
        assert!(resolved);
    }
}
