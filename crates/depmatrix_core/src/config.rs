//! Process configuration.
//!
//! Values come from environment variables with development defaults:
//! - `DEPMATRIX_DB`: SQLite database file (default `./depmatrix.sqlite3`)
//! - `DEPMATRIX_LOG_DIR`: log directory (default `<cwd>/logs`)
//! - `DEPMATRIX_LOG_LEVEL`: trace|debug|info|warn|error (default per build mode)
//!
//! Relative log directories are resolved against the working directory, since
//! the logger only accepts absolute paths.

use crate::logging::default_log_level;
use std::path::{Path, PathBuf};

pub const DB_PATH_ENV: &str = "DEPMATRIX_DB";
pub const LOG_DIR_ENV: &str = "DEPMATRIX_LOG_DIR";
pub const LOG_LEVEL_ENV: &str = "DEPMATRIX_LOG_LEVEL";

const DEFAULT_DB_PATH: &str = "depmatrix.sqlite3";
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Always absolute.
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_dir: absolutize(Path::new(DEFAULT_LOG_DIR)),
            log_level: default_log_level().to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            db_path: read(DB_PATH_ENV).map(PathBuf::from).unwrap_or(defaults.db_path),
            log_dir: read(LOG_DIR_ENV)
                .map(|dir| absolutize(Path::new(&dir)))
                .unwrap_or(defaults.log_dir),
            log_level: read(LOG_LEVEL_ENV).unwrap_or(defaults.log_level),
        }
    }

    /// Applies explicit overrides, e.g. from command-line flags.
    pub fn with_overrides(
        mut self,
        db_path: Option<PathBuf>,
        log_dir: Option<PathBuf>,
        log_level: Option<String>,
    ) -> Self {
        if let Some(db_path) = db_path {
            self.db_path = db_path;
        }
        if let Some(log_dir) = log_dir {
            self.log_dir = absolutize(&log_dir);
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
        self
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, DB_PATH_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.db_path, PathBuf::from("depmatrix.sqlite3"));
        assert!(config.log_dir.is_absolute());
        assert!(config.log_dir.ends_with("logs"));
        assert_eq!(config.log_level, super::default_log_level());
    }

    #[test]
    fn environment_values_override_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (DB_PATH_ENV, "/var/lib/depmatrix/data.sqlite3"),
            (LOG_DIR_ENV, "/var/log/depmatrix"),
            (LOG_LEVEL_ENV, "warn"),
        ]));
        assert_eq!(config.db_path, PathBuf::from("/var/lib/depmatrix/data.sqlite3"));
        assert_eq!(config.log_dir, PathBuf::from("/var/log/depmatrix"));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn blank_values_and_relative_dirs_are_normalized() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (DB_PATH_ENV, "   "),
            (LOG_DIR_ENV, "run/logs"),
        ]));
        assert_eq!(config.db_path, PathBuf::from("depmatrix.sqlite3"));
        assert!(config.log_dir.is_absolute());
        assert!(config.log_dir.ends_with("run/logs"));
    }

    #[test]
    fn overrides_win_over_environment() {
        let config = AppConfig::from_lookup(lookup_from(&[(LOG_LEVEL_ENV, "error")]))
            .with_overrides(Some(PathBuf::from("other.sqlite3")), None, Some("trace".into()));
        assert_eq!(config.db_path, PathBuf::from("other.sqlite3"));
        assert_eq!(config.log_level, "trace");
    }
}
