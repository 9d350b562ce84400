//! Core configuration.
//!
//! # Responsibility
//! - Load `calnote.toml` (storage path, logging, navigation floor).
//! - Apply `CALNOTE_*` environment overrides on top of the file.
//!
//! # Invariants
//! - A missing file yields defaults; a malformed file is an error.
//! - Invalid override values are ignored with a warning, never fatal.

use crate::model::month::YearMonth;
use crate::service::state_store::StateStoreOptions;
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Database file used when no path is configured.
pub const DEFAULT_DB_FILE_NAME: &str = "calnote.sqlite3";

pub const ENV_DB_PATH: &str = "CALNOTE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CALNOTE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CALNOTE_LOG_DIR";
pub const ENV_NAV_FLOOR: &str = "CALNOTE_NAV_FLOOR";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub navigation: NavigationConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    pub level: Option<String>,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Earliest navigable month as `YYYY-MM`.
    pub floor: Option<String>,
}

impl CoreConfig {
    /// Configured database path, or [`DEFAULT_DB_FILE_NAME`] in the working
    /// directory.
    pub fn db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE_NAME))
    }

    /// Navigation floor, when configured and well formed.
    pub fn nav_floor(&self) -> Option<YearMonth> {
        self.navigation
            .floor
            .as_deref()
            .and_then(YearMonth::parse_key)
    }

    pub fn store_options(&self) -> StateStoreOptions {
        StateStoreOptions {
            nav_floor: self.nav_floor(),
            ..StateStoreOptions::default()
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Loads configuration from `path` (if it exists) plus environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<CoreConfig, ConfigError> {
    let mut config = match path {
        Some(path) if path.exists() => read_config_file(path)?,
        _ => CoreConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<CoreConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: CoreConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if config.navigation.floor.is_some() && config.nav_floor().is_none() {
        warn!(
            "event=config_load module=config status=warn reason=invalid_nav_floor path={}",
            path.display()
        );
    }
    Ok(config)
}

/// Applies `CALNOTE_*` process environment overrides.
pub fn apply_env_overrides(config: &mut CoreConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Applies overrides read through `lookup`.
pub fn apply_overrides_from(config: &mut CoreConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = non_blank(lookup(ENV_DB_PATH)) {
        config.storage.db_path = Some(PathBuf::from(raw));
    }
    if let Some(raw) = non_blank(lookup(ENV_LOG_LEVEL)) {
        config.logging.level = Some(raw);
    }
    if let Some(raw) = non_blank(lookup(ENV_LOG_DIR)) {
        config.logging.dir = Some(PathBuf::from(raw));
    }
    if let Some(raw) = non_blank(lookup(ENV_NAV_FLOOR)) {
        if YearMonth::parse_key(&raw).is_some() {
            config.navigation.floor = Some(raw);
        } else {
            warn!(
                "event=config_env module=config status=warn reason=invalid_value key={ENV_NAV_FLOOR}"
            );
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{apply_overrides_from, load_config, CoreConfig, ENV_DB_PATH, ENV_NAV_FLOOR};
    use crate::model::month::YearMonth;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_ok());
        assert_eq!(
            CoreConfig::default().db_path(),
            PathBuf::from(super::DEFAULT_DB_FILE_NAME)
        );
    }

    #[test]
    fn file_sections_are_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calnote.toml");
        std::fs::write(
            &path,
            "[storage]\ndb_path = \"/data/cal.sqlite3\"\n\n[navigation]\nfloor = \"2019-05\"\n",
        )
        .unwrap();

        let config = super::read_config_file(&path).unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/data/cal.sqlite3"));
        assert_eq!(config.nav_floor(), YearMonth::new(2019, 4));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calnote.toml");
        std::fs::write(&path, "[storage\n").unwrap();
        assert!(super::read_config_file(&path).is_err());
    }

    #[test]
    fn overrides_apply_and_invalid_floor_is_ignored() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(ENV_DB_PATH, " /tmp/other.sqlite3 "), (ENV_NAV_FLOOR, "2019-13")]);
        let mut config = CoreConfig::default();
        config.navigation.floor = Some("2020-01".to_string());

        apply_overrides_from(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.db_path(), PathBuf::from("/tmp/other.sqlite3"));
        assert_eq!(config.navigation.floor.as_deref(), Some("2020-01"));
    }
}
