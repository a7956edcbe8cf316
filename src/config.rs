//! Daemon settings
//!
//! Settings come from a TOML file. Every key is optional:
//!
//! ```toml
//! event_table = "/etc/evtrigger/event-codes"
//! rules = "/etc/evtrigger/triggers.d"
//! devices = ["/dev/input/event0", "/dev/input/event3"]
//! hotplug = false
//! dump = false
//! ignore = ["KEY_BRIGHTNESSDOWN", "KEY_BRIGHTNESSUP"]
//! log_level = "debug"
//! ```
//!
//! ## Config File Locations
//!
//! The first command-line argument, else the first existing of
//!
//! | Scope | Path |
//! |-------|------|
//! | System | `/etc/evtrigger/config.toml` |
//! | User | `~/.config/evtrigger/config.toml` |
//!
//! and built-in defaults when neither exists.

use crate::input::{EventCode, EventCodeTable};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// System-wide settings file
pub const SYSTEM_CONFIG_PATH: &str = "/etc/evtrigger/config.toml";

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to parse config file
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Returns the per-user config file path, if a config directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("evtrigger").join("config.toml"))
}

/// Main daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `NAME CODE` table used to resolve event names
    pub event_table: PathBuf,
    /// Rule file or directory of `*.conf` rule files
    pub rules: PathBuf,
    /// Devices to watch when hotplug is off
    pub devices: Vec<PathBuf>,
    /// Follow devices through udev instead of a fixed list
    pub hotplug: bool,
    /// Print every key/switch event to stdout
    pub dump: bool,
    /// Event names (or decimal key codes) excluded from state tracking
    pub ignore: Vec<String>,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_table: PathBuf::from("/etc/evtrigger/event-codes"),
            rules: PathBuf::from("/etc/evtrigger/triggers.d"),
            devices: Vec::new(),
            hotplug: false,
            dump: false,
            ignore: Vec::new(),
            log_level: None,
        }
    }
}

impl Config {
    /// Load from an explicit path, or search the default locations.
    ///
    /// Returns the default configuration (and `None` as the source) if no
    /// file is found.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_from(path)?, Some(path.to_path_buf())));
        }

        let candidates = std::iter::once(PathBuf::from(SYSTEM_CONFIG_PATH)).chain(user_config_path());
        for path in candidates {
            if path.exists() {
                return Ok((Self::load_from(&path)?, Some(path)));
            }
        }

        Ok((Self::default(), None))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the ignore list. Unknown names are reported and dropped.
    pub fn ignored_codes(&self, codes: &EventCodeTable) -> HashSet<EventCode> {
        self.ignore
            .iter()
            .filter_map(|entry| {
                let resolved = codes
                    .resolve(entry)
                    .or_else(|| entry.parse().ok().map(EventCode::key));
                if resolved.is_none() {
                    warn!("Unknown event {:?} in ignore list", entry);
                }
                resolved
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let config = Config::default();
        assert_eq!(config.event_table, PathBuf::from("/etc/evtrigger/event-codes"));
        assert_eq!(config.rules, PathBuf::from("/etc/evtrigger/triggers.d"));
        assert!(config.devices.is_empty());
        assert!(!config.hotplug);
        assert!(!config.dump);
        assert!(config.ignore.is_empty());
        assert_eq!(config.log_level, None);
    }

    #[test]
    fn config_deserializes_from_toml() {
        let toml_str = r#"
event_table = "/tmp/codes"
rules = "/tmp/rules.d"
devices = ["/dev/input/event0", "/dev/input/event3"]
dump = true
ignore = ["KEY_BRIGHTNESSUP"]
log_level = "debug"
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");

        assert_eq!(config.event_table, PathBuf::from("/tmp/codes"));
        assert_eq!(config.rules, PathBuf::from("/tmp/rules.d"));
        assert_eq!(config.devices.len(), 2);
        assert!(config.dump);
        assert!(!config.hotplug);
        assert_eq!(config.ignore, vec!["KEY_BRIGHTNESSUP".to_string()]);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn config_rejects_unknown_keys() {
        let result: Result<Config, _> = toml::from_str("devcies = []\n");
        assert!(result.is_err());
    }

    #[test]
    fn config_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "hotplug = true\n").unwrap();

        let (config, source) = Config::load(Some(&path)).unwrap();
        assert!(config.hotplug);
        assert_eq!(source, Some(path));
    }

    #[test]
    fn config_load_missing_explicit_path_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/path/config.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn config_load_bad_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "hotplug = maybe\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn ignore_list_resolves_names_and_numbers() {
        let codes = EventCodeTable::parse("KEY_BRIGHTNESSUP 225\nSW_LID 0\n");
        let config = Config {
            ignore: vec![
                "KEY_BRIGHTNESSUP".to_string(),
                "SW_LID".to_string(),
                "240".to_string(),
                "KEY_UNKNOWN".to_string(),
            ],
            ..Config::default()
        };

        let ignored = config.ignored_codes(&codes);
        assert_eq!(ignored.len(), 3);
        assert!(ignored.contains(&EventCode::key(225)));
        assert!(ignored.contains(&EventCode::switch(0)));
        assert!(ignored.contains(&EventCode::key(240)));
    }
}
