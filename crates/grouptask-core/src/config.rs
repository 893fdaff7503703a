//! Processor tuning knobs.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for one processor instance.
///
/// Deserializes from any serde format; missing fields take their defaults,
/// so hosts can embed it in a larger config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Upper bound on tasks per fetch.
    pub max_tasks_per_batch: usize,
    /// Longest a single fetch may block.
    pub wait_timeout_ms: u64,
    /// Pause after a queue error before fetching again.
    pub sleep_time_after_consumer_error_ms: u64,
    /// Pin the processor to one group. `None` takes whatever group the queue
    /// hands out.
    pub group_key: Option<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_batch: 100,
            wait_timeout_ms: 5_000,
            sleep_time_after_consumer_error_ms: 5_000,
            group_key: None,
        }
    }
}

impl ProcessorConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn sleep_time_after_consumer_error(&self) -> Duration {
        Duration::from_millis(self.sleep_time_after_consumer_error_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tasks_per_batch == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.max_tasks_per_batch, 100);
        assert_eq!(config.wait_timeout(), Duration::from_secs(5));
        assert_eq!(config.sleep_time_after_consumer_error(), Duration::from_secs(5));
        assert_eq!(config.group_key, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: ProcessorConfig =
            serde_json::from_str(r#"{"max_tasks_per_batch": 10, "group_key": "tenant-1"}"#)
                .unwrap();
        assert_eq!(config.max_tasks_per_batch, 10);
        assert_eq!(config.group_key.as_deref(), Some("tenant-1"));
        assert_eq!(config.wait_timeout_ms, 5_000);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = ProcessorConfig {
            max_tasks_per_batch: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn millis_conversion_saturates() {
        assert_eq!(duration_to_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_to_millis(Duration::MAX), u64::MAX);
    }
}
