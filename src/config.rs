//! Analyzer configuration and the wall-clock source used for `now()`

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for query analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Name of the synthetic column time conditions are written against
    pub time_column: String,
    /// Projected columns that never need to be read from storage
    pub skipped_projection_columns: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            time_column: "time".to_string(),
            skipped_projection_columns: vec!["time".to_string(), "sequence_number".to_string()],
        }
    }
}

impl AnalyzerConfig {
    /// Loads a JSON config file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn is_skipped_projection(&self, column: &str) -> bool {
        self.skipped_projection_columns.iter().any(|c| c == column)
    }
}

/// Source of the current time, in nanoseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> i64;
}

/// Reads the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

/// Always reports the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_nanos(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.time_column, "time");
        assert!(config.is_skipped_projection("sequence_number"));
        assert!(!config.is_skipped_projection("value"));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"time_column": "ts"}}"#).unwrap();

        let config = AnalyzerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.time_column, "ts");
        assert_eq!(
            config.skipped_projection_columns,
            AnalyzerConfig::default().skipped_projection_columns
        );
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AnalyzerConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));

        assert!(matches!(
            AnalyzerConfig::from_file("/nonexistent/tsquery.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(42);
        assert_eq!(clock.now_nanos(), 42);
        assert!(SystemClock.now_nanos() > 0);
    }
}
