//! Capacity and age limits

use crate::config::RecentFilesConfig;
use crate::types::DocumentRecord;
use std::time::Duration;

/// Which records survive a capacity check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionPlan {
    /// Fingerprints to keep, most recent first
    pub keep: Vec<String>,
    /// Fingerprints to drop, along with their cached content
    pub drop: Vec<String>,
}

impl EvictionPlan {
    pub fn is_noop(&self) -> bool {
        self.drop.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    capacity: usize,
    retention: Duration,
}

impl EvictionPolicy {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize, retention: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            retention,
        }
    }

    pub fn from_config(config: &RecentFilesConfig) -> Self {
        Self::new(config.capacity, config.retention)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Split `records` into the `capacity` most recently opened and the rest.
    ///
    /// The sort is stable, so records with equal `last_opened_at` keep the
    /// order they were passed in.
    pub fn plan<'a, I>(&self, records: I) -> EvictionPlan
    where
        I: IntoIterator<Item = &'a DocumentRecord>,
    {
        let mut ranked: Vec<&DocumentRecord> = records.into_iter().collect();
        ranked.sort_by(|a, b| b.last_opened_at.cmp(&a.last_opened_at));

        let split = ranked.len().min(self.capacity);
        let (keep, drop) = ranked.split_at(split);
        EvictionPlan {
            keep: keep.iter().map(|r| r.fingerprint.clone()).collect(),
            drop: drop.iter().map(|r| r.fingerprint.clone()).collect(),
        }
    }

    /// Content cached before this instant (epoch millis) is expired
    pub fn retention_cutoff(&self, now_millis: i64) -> i64 {
        let retention_ms = i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX);
        now_millis.saturating_sub(retention_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RETENTION;

    fn record(fingerprint: &str, opened_at: i64) -> DocumentRecord {
        DocumentRecord::new(fingerprint, "doc.pdf", "file:///doc.pdf", opened_at)
    }

    #[test]
    fn test_under_capacity_is_noop() {
        let policy = EvictionPolicy::new(3, DEFAULT_RETENTION);
        let records = [record("a", 1), record("b", 2)];

        let plan = policy.plan(&records);
        assert!(plan.is_noop());
        assert_eq!(plan.keep, vec!["b", "a"]);
    }

    #[test]
    fn test_drops_least_recent() {
        let policy = EvictionPolicy::new(2, DEFAULT_RETENTION);
        let records = [record("fp1", 1), record("fp3", 3), record("fp2", 2)];

        let plan = policy.plan(&records);
        assert_eq!(plan.keep, vec!["fp3", "fp2"]);
        assert_eq!(plan.drop, vec!["fp1"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let policy = EvictionPolicy::new(1, DEFAULT_RETENTION);
        let records = [record("first", 5), record("second", 5)];

        let plan = policy.plan(&records);
        assert_eq!(plan.keep, vec!["first"]);
        assert_eq!(plan.drop, vec!["second"]);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let policy = EvictionPolicy::new(0, DEFAULT_RETENTION);
        assert_eq!(policy.capacity(), 1);
    }

    #[test]
    fn test_retention_cutoff() {
        let policy = EvictionPolicy::new(20, DEFAULT_RETENTION);
        let now = 40 * 86_400_000;
        assert_eq!(policy.retention_cutoff(now), 10 * 86_400_000);

        let forever = EvictionPolicy::new(20, Duration::MAX);
        assert_eq!(forever.retention_cutoff(0), -i64::MAX);
    }
}
