//! Runtime configuration for the binaries.
//!
//! Values start from [`TimetableConfig::default`], are replaced by a JSON file
//! when `TIMETABLE_CONFIG` names one, and finally by individual variables:
//!
//! - `TIMETABLE_DB_PATH`: SQLite database file
//! - `TIMETABLE_HTTP_ADDR`: listen address of the HTTP server
//! - `TIMETABLE_USER_ID`: user the CLI acts as
//! - `TIMETABLE_PREVIEW_LIMIT`: rows listed per dependency kind in previews
//! - `TIMETABLE_HORIZON_DAYS`: fallback expansion window for recurring events
//! - `RUST_LOG`: tracing filter

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dependencies::DEFAULT_PREVIEW_LIMIT;
use crate::persistence::UserId;

pub const CONFIG_FILE_VAR: &str = "TIMETABLE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimetableConfig {
    pub database_path: PathBuf,
    pub http_addr: String,
    pub user_id: i64,
    pub preview_limit: usize,
    pub default_horizon_days: u32,
    pub log_filter: String,
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("timetable.db"),
            http_addr: "127.0.0.1:8080".to_string(),
            user_id: 1,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            default_horizon_days: 366,
            log_filter: "info".to_string(),
        }
    }
}

impl TimetableConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TimetableConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_VAR) {
            Some(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("TIMETABLE_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup("TIMETABLE_HTTP_ADDR") {
            self.http_addr = addr;
        }
        if let Some(raw) = lookup("TIMETABLE_USER_ID") {
            self.user_id = parse("TIMETABLE_USER_ID", &raw)?;
        }
        if let Some(raw) = lookup("TIMETABLE_PREVIEW_LIMIT") {
            self.preview_limit = parse("TIMETABLE_PREVIEW_LIMIT", &raw)?;
        }
        if let Some(raw) = lookup("TIMETABLE_HORIZON_DAYS") {
            self.default_horizon_days = parse("TIMETABLE_HORIZON_DAYS", &raw)?;
        }
        if let Some(filter) = lookup("RUST_LOG") {
            self.log_filter = filter;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(invalid("databasePath", "", "must not be empty"));
        }
        if self.user_id <= 0 {
            return Err(invalid("userId", self.user_id, "must be positive"));
        }
        if self.preview_limit == 0 {
            return Err(invalid("previewLimit", 0, "must be at least 1"));
        }
        if self.default_horizon_days == 0 {
            return Err(invalid("defaultHorizonDays", 0, "must be at least 1"));
        }
        Ok(())
    }

    pub fn user(&self) -> UserId {
        UserId(self.user_id)
    }

    /// Last date a recurrence may reach when nothing else bounds it.
    pub fn fallback_horizon(&self, from: NaiveDate) -> NaiveDate {
        from.checked_add_days(Days::new(u64::from(self.default_horizon_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Caps a requested horizon to the configured window from `from`.
    pub fn clamp_horizon(&self, from: NaiveDate, horizon: NaiveDate) -> NaiveDate {
        horizon.min(self.fallback_horizon(from))
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| invalid(key, raw, err.to_string()))
}

fn invalid(key: &'static str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_any_variables() {
        let config = TimetableConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TimetableConfig::default());
        assert_eq!(config.preview_limit, 10);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"userId": 4, "previewLimit": 3}}"#).unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let config = TimetableConfig::from_lookup(lookup(&[
            (CONFIG_FILE_VAR, &path),
            ("TIMETABLE_PREVIEW_LIMIT", "5"),
        ]))
        .unwrap();
        assert_eq!(config.user_id, 4);
        assert_eq!(config.preview_limit, 5);
        assert_eq!(config.http_addr, "127.0.0.1:8080");
    }

    #[test]
    fn unparsable_number_is_an_error() {
        let err = TimetableConfig::from_lookup(lookup(&[("TIMETABLE_USER_ID", "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TIMETABLE_USER_ID", .. }));
    }

    #[test]
    fn zero_preview_limit_is_rejected() {
        let err =
            TimetableConfig::from_lookup(lookup(&[("TIMETABLE_PREVIEW_LIMIT", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "previewLimit", .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = TimetableConfig::from_lookup(lookup(&[(CONFIG_FILE_VAR, "/no/such/config.json")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn horizons_are_capped_to_the_window() {
        let config = TimetableConfig::default();
        let start = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let window = NaiveDate::from_ymd_opt(2025, 9, 3).unwrap();
        assert_eq!(config.fallback_horizon(start), window);
        assert_eq!(config.clamp_horizon(start, NaiveDate::MAX), window);
        let near = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert_eq!(config.clamp_horizon(start, near), near);
        assert_eq!(config.fallback_horizon(NaiveDate::MAX), NaiveDate::MAX);
    }
}
