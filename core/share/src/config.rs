//! Share layer configuration.

use std::time::Duration;

/// Lowest retention age, in days, the sweeper accepts.
pub const MIN_RETENTION_DAYS: i64 = 14;

/// Immutable settings for share operations, built once at startup.
#[derive(Debug, Clone)]
pub struct ShareConfig {
    retention_floor_days: i64,
    /// Upper bound on a blocking delete's wait for its task.
    pub task_wait_timeout: Duration,
    /// Delay between task status polls.
    pub task_poll_interval: Duration,
}

impl ShareConfig {
    /// Retention floor in days; never below [`MIN_RETENTION_DAYS`].
    pub fn retention_floor_days(&self) -> i64 {
        self.retention_floor_days
    }

    /// Set the retention floor; values below [`MIN_RETENTION_DAYS`] are raised to it.
    pub fn with_retention_floor(mut self, days: i64) -> Self {
        self.retention_floor_days = days.max(MIN_RETENTION_DAYS);
        self
    }

    /// Set the task wait timeout and poll interval.
    pub fn with_task_wait(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.task_wait_timeout = timeout;
        self.task_poll_interval = poll_interval;
        self
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            retention_floor_days: MIN_RETENTION_DAYS,
            task_wait_timeout: Duration::from_secs(300),
            task_poll_interval: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_floor_cannot_drop_below_minimum() {
        let config = ShareConfig::default().with_retention_floor(3);
        assert_eq!(config.retention_floor_days(), MIN_RETENTION_DAYS);

        let config = ShareConfig::default().with_retention_floor(-1);
        assert_eq!(config.retention_floor_days(), MIN_RETENTION_DAYS);

        let config = ShareConfig::default().with_retention_floor(30);
        assert_eq!(config.retention_floor_days(), 30);
    }
}
