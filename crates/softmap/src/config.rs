//! Table sizing and sweep configuration

use serde::Deserialize;

use crate::error::{Error, Result};

/// Number of dead reads that trigger a sweep when nothing else is configured.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 10;

/// Construction parameters for a [`SoftMap`](crate::SoftMap).
///
/// Sizing hints are forwarded to the underlying concurrent table; the sweep
/// threshold controls how many dead reads accumulate before the reclamation
/// queue is drained.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SoftMapConfig {
    /// Number of entries the map is expected to hold
    pub initial_capacity: usize,

    /// Table density used to derive the allocated capacity
    pub load_factor: f32,

    /// Estimated number of concurrently updating threads; `None` keeps the
    /// table's own shard count
    pub concurrency_level: Option<usize>,

    /// Dead reads (or pending reclaim notifications) that trigger a sweep
    pub sweep_threshold: usize,
}

impl Default for SoftMapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            load_factor: 0.75,
            concurrency_level: None,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }
}

impl SoftMapConfig {
    /// Config with the given expected number of entries
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    /// Set the load factor
    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Set the concurrency level hint
    pub fn concurrency_level(mut self, level: usize) -> Self {
        self.concurrency_level = Some(level);
        self
    }

    /// Set the sweep threshold
    pub fn sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold;
        self
    }

    /// Reject values the table cannot be built from
    pub fn validate(&self) -> Result<()> {
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(Error::invalid_config(
                "load_factor",
                format!("must be a positive number, got {}", self.load_factor),
            ));
        }
        if self.concurrency_level == Some(0) {
            return Err(Error::invalid_config(
                "concurrency_level",
                "must be at least 1",
            ));
        }
        if self.sweep_threshold == 0 {
            return Err(Error::invalid_config("sweep_threshold", "must be at least 1"));
        }
        Ok(())
    }

    /// Capacity to allocate so `initial_capacity` entries fit under the load factor
    pub(crate) fn table_capacity(&self) -> usize {
        let scaled = (self.initial_capacity as f64 / f64::from(self.load_factor)).ceil();
        if scaled >= usize::MAX as f64 {
            usize::MAX
        } else {
            scaled as usize
        }
    }

    /// Shard count for the table, a power of two no smaller than 2
    pub(crate) fn shard_amount(&self) -> Option<usize> {
        self.concurrency_level
            .map(|level| level.max(2).next_power_of_two())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SoftMapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweep_threshold, DEFAULT_SWEEP_THRESHOLD);
        assert_eq!(config.shard_amount(), None);
    }

    #[test]
    fn test_table_capacity() {
        let config = SoftMapConfig::with_capacity(30).load_factor(0.75);
        assert_eq!(config.table_capacity(), 40);

        let config = SoftMapConfig::with_capacity(0);
        assert_eq!(config.table_capacity(), 0);
    }

    #[test]
    fn test_shard_amount_rounding() {
        assert_eq!(SoftMapConfig::default().concurrency_level(1).shard_amount(), Some(2));
        assert_eq!(SoftMapConfig::default().concurrency_level(5).shard_amount(), Some(8));
        assert_eq!(SoftMapConfig::default().concurrency_level(16).shard_amount(), Some(16));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(SoftMapConfig::default().load_factor(0.0).validate().is_err());
        assert!(SoftMapConfig::default().load_factor(f32::NAN).validate().is_err());
        assert!(SoftMapConfig::default().concurrency_level(0).validate().is_err());
        assert!(SoftMapConfig::default().sweep_threshold(0).validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SoftMapConfig =
            serde_json::from_str(r#"{ "initial_capacity": 64, "sweep_threshold": 4 }"#).unwrap();
        assert_eq!(config.initial_capacity, 64);
        assert_eq!(config.sweep_threshold, 4);
        assert_eq!(config.load_factor, 0.75);
        assert_eq!(config.concurrency_level, None);
    }
}
