//! Configuration for coordinators, backups, and retention.

use chrono::{NaiveTime, Weekday};
use std::time::Duration;

/// Configuration for the transaction coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Default retry budget for transactions that do not specify one.
    pub max_retries: u32,

    /// Default wall-clock budget for a transaction.
    pub timeout: Duration,

    /// First backoff delay; doubled on each retry.
    pub base_delay: Duration,

    /// Upper bound on a single backoff delay.
    pub max_delay: Duration,

    /// Fixed cooldown after a confirmed deadlock.
    pub deadlock_cooldown: Duration,

    /// How many terminal transaction summaries to keep.
    pub history_limit: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(30),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            deadlock_cooldown: Duration::from_millis(500),
            history_limit: 1000,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default retry budget.
    #[must_use]
    pub const fn max_retries(mut self, value: u32) -> Self {
        self.max_retries = value;
        self
    }

    /// Sets the default transaction timeout.
    #[must_use]
    pub const fn timeout(mut self, value: Duration) -> Self {
        self.timeout = value;
        self
    }

    /// Sets the first backoff delay.
    #[must_use]
    pub const fn base_delay(mut self, value: Duration) -> Self {
        self.base_delay = value;
        self
    }

    /// Sets the backoff cap.
    #[must_use]
    pub const fn max_delay(mut self, value: Duration) -> Self {
        self.max_delay = value;
        self
    }

    /// Sets the deadlock cooldown.
    #[must_use]
    pub const fn deadlock_cooldown(mut self, value: Duration) -> Self {
        self.deadlock_cooldown = value;
        self
    }

    /// Sets the history bound.
    #[must_use]
    pub const fn history_limit(mut self, value: usize) -> Self {
        self.history_limit = value;
        self
    }
}

/// Configuration for backup creation.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Whether to compress backup artifacts with zstd.
    pub compress: bool,

    /// Whether to validate a backup immediately after creating it.
    pub validate_on_create: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            compress: false,
            validate_on_create: true,
        }
    }
}

impl BackupConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether artifacts are compressed.
    #[must_use]
    pub const fn compress(mut self, value: bool) -> Self {
        self.compress = value;
        self
    }

    /// Sets whether new backups are validated immediately.
    #[must_use]
    pub const fn validate_on_create(mut self, value: bool) -> Self {
        self.validate_on_create = value;
        self
    }
}

/// Policy for pruning old backups.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Backups strictly older than this many days are deleted.
    pub max_age_days: i64,

    /// At most this many backups are kept after age pruning.
    pub max_count: usize,

    /// Keep the newest restorable backup even when age-expired, so cleanup
    /// can never remove the last restore target.
    pub retain_latest: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            max_count: 10,
            retain_latest: true,
        }
    }
}

impl RetentionPolicy {
    /// Creates a new policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the age bound in days.
    #[must_use]
    pub const fn max_age_days(mut self, value: i64) -> Self {
        self.max_age_days = value;
        self
    }

    /// Sets the count bound.
    #[must_use]
    pub const fn max_count(mut self, value: usize) -> Self {
        self.max_count = value;
        self
    }

    /// Sets the last-backup safeguard.
    #[must_use]
    pub const fn retain_latest(mut self, value: bool) -> Self {
        self.retain_latest = value;
        self
    }
}

/// Configuration for automated backup scheduling.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Local wall-clock time at which a full backup runs.
    pub full_backup_time: NaiveTime,

    /// Days on which the full backup runs; `None` means every day.
    pub full_backup_days: Option<Vec<Weekday>>,

    /// Local wall-clock time at which retention cleanup runs.
    pub cleanup_time: NaiveTime,

    /// How often the scheduler thread polls the clock.
    pub poll_interval: Duration,
}

impl ScheduleConfig {
    /// Creates a schedule firing backups and cleanup at the given times.
    #[must_use]
    pub fn new(full_backup_time: NaiveTime, cleanup_time: NaiveTime) -> Self {
        Self {
            full_backup_time,
            full_backup_days: None,
            cleanup_time,
            poll_interval: Duration::from_secs(30),
        }
    }

    /// Restricts full backups to the given weekdays.
    #[must_use]
    pub fn full_backup_days(mut self, days: Vec<Weekday>) -> Self {
        self.full_backup_days = Some(days);
        self
    }

    /// Sets the clock poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }
}
