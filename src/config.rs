//! Runtime configuration.
//!
//! Values come from the environment (optionally seeded from a `.env` file)
//! and can be overridden by command-line flags.

use std::path::PathBuf;

pub const DATA_FILE_VAR: &str = "NOSHOW_DATA_FILE";
pub const EXPORT_DIR_VAR: &str = "NOSHOW_EXPORT_DIR";

const DEFAULT_DATA_FILE: &str = "data/lecture_data.json";
const DEFAULT_EXPORT_DIR: &str = "exports";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// JSON document backing the registry
    pub data_file: PathBuf,
    /// Directory receiving CSV/XLSX exports and backups
    pub export_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env(verbose: u8) -> Self {
        Self::from_lookup(verbose, |key| std::env::var(key).ok())
    }

    fn from_lookup(verbose: u8, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_file = lookup(DATA_FILE_VAR)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string());
        let export_dir = lookup(EXPORT_DIR_VAR)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string());

        Self {
            verbose,
            data_file: PathBuf::from(data_file),
            export_dir: PathBuf::from(export_dir),
        }
    }

    pub fn with_data_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.data_file = path;
        }
        self
    }

    pub fn with_export_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.export_dir = dir;
        }
        self
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let config = AppConfig::from_lookup(0, |_| None);
        assert_eq!(config.data_file, PathBuf::from(DEFAULT_DATA_FILE));
        assert_eq!(config.export_dir, PathBuf::from(DEFAULT_EXPORT_DIR));
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn environment_and_flags_override_defaults() {
        let config = AppConfig::from_lookup(2, |key| match key {
            DATA_FILE_VAR => Some("/srv/noshow.json".to_string()),
            EXPORT_DIR_VAR => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.data_file, PathBuf::from("/srv/noshow.json"));
        assert_eq!(config.export_dir, PathBuf::from(DEFAULT_EXPORT_DIR));
        assert_eq!(config.log_level(), "trace");

        let config = config.with_export_dir(Some(PathBuf::from("out")));
        assert_eq!(config.export_dir, PathBuf::from("out"));
    }
}
