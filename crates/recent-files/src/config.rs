//! Configuration for the recent files cache

use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 20;
/// Cached content older than this is swept
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct RecentFilesConfig {
    /// Maximum number of tracked documents
    pub capacity: usize,
    /// Age after which cached content is purged
    pub retention: Duration,
    /// Re-run the retention sweep on this interval after the startup sweep
    pub sweep_interval: Option<Duration>,
}

impl Default for RecentFilesConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            retention: DEFAULT_RETENTION,
            sweep_interval: None,
        }
    }
}

impl RecentFilesConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecentFilesConfig::default();
        assert_eq!(config.capacity, 20);
        assert_eq!(config.retention, Duration::from_secs(2_592_000));
        assert!(config.sweep_interval.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = RecentFilesConfig::default()
            .with_capacity(2)
            .with_sweep_interval(Duration::from_secs(3600));
        assert_eq!(config.capacity, 2);
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(3600)));
    }
}
