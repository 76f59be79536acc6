//! Environment configuration

use recent_files::{RecentFilesConfig, DEFAULT_CAPACITY};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_RETENTION_DAYS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Root for both the metadata snapshot and the content cache
    pub data_dir: PathBuf,
    pub capacity: usize,
    pub retention_days: u64,
}

impl CliConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("RECENT_FILES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.recent-files"));

        let capacity = lookup("RECENT_FILES_CAPACITY")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CAPACITY)
            .max(1);

        let retention_days = lookup("RECENT_FILES_RETENTION_DAYS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETENTION_DAYS);

        Self {
            data_dir,
            capacity,
            retention_days,
        }
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.data_dir.join("metadata")
    }

    pub fn content_dir(&self) -> PathBuf {
        self.data_dir.join("content")
    }

    pub fn cache_config(&self) -> RecentFilesConfig {
        RecentFilesConfig::default()
            .with_capacity(self.capacity)
            .with_retention(Duration::from_secs(self.retention_days * 24 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> CliConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.data_dir, PathBuf::from("./.recent-files"));
        assert_eq!(config.capacity, 20);
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("RECENT_FILES_DIR", "/tmp/rf"),
            ("RECENT_FILES_CAPACITY", "5"),
            ("RECENT_FILES_RETENTION_DAYS", "7"),
        ]);
        assert_eq!(config.content_dir(), PathBuf::from("/tmp/rf/content"));
        assert_eq!(config.metadata_dir(), PathBuf::from("/tmp/rf/metadata"));
        assert_eq!(config.cache_config().capacity, 5);
        assert_eq!(
            config.cache_config().retention,
            Duration::from_secs(7 * 86_400)
        );
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("RECENT_FILES_CAPACITY", "lots"),
            ("RECENT_FILES_RETENTION_DAYS", "-3"),
        ]);
        assert_eq!(config.capacity, 20);
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn test_zero_capacity_clamps() {
        assert_eq!(config_from(&[("RECENT_FILES_CAPACITY", "0")]).capacity, 1);
    }
}
