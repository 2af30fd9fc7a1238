//! Automated backup scheduling.

use crate::backup::{BackupManager, RetentionManager};
use crate::config::ScheduleConfig;
use chrono::{Datelike, Local, NaiveDate, NaiveTime, Weekday};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Jobs the scheduler can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    FullBackup,
    Cleanup,
}

/// A cancellable background thread firing backups and cleanup on a
/// wall-clock schedule.
///
/// The thread polls the local clock at the configured interval and fires a
/// job at most once per matching minute. [`stop`](BackupScheduler::stop)
/// signals the thread and joins it; dropping the scheduler does the same.
pub struct BackupScheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Starts the background scheduler described by `config`.
pub fn schedule_automated_backups(
    manager: Arc<BackupManager>,
    retention: Arc<RetentionManager>,
    config: ScheduleConfig,
) -> BackupScheduler {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let handle = thread::Builder::new()
        .name("txvault-scheduler".to_string())
        .spawn(move || run_loop(&manager, &retention, &config, &stop_flag))
        .expect("failed to spawn scheduler thread");

    BackupScheduler {
        stop,
        handle: Some(handle),
    }
}

impl BackupScheduler {
    /// Signals the scheduler thread to stop and joins it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("scheduler thread panicked");
            }
        }
    }

    /// True while the scheduler thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.stop.load(Ordering::SeqCst)
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    manager: &BackupManager,
    retention: &RetentionManager,
    config: &ScheduleConfig,
    stop: &AtomicBool,
) {
    info!(
        backup_time = %config.full_backup_time,
        cleanup_time = %config.cleanup_time,
        "scheduler started"
    );
    let mut last_backup: Option<(NaiveDate, u32)> = None;
    let mut last_cleanup: Option<(NaiveDate, u32)> = None;

    while !stop.load(Ordering::SeqCst) {
        let now = Local::now();
        let today = now.date_naive();
        let time = now.time();

        if minute_matches(time, config.full_backup_time)
            && day_enabled(now.weekday(), config.full_backup_days.as_deref())
            && fire_once(&mut last_backup, today, config.full_backup_time)
        {
            run_job(Job::FullBackup, manager, retention);
        }

        if minute_matches(time, config.cleanup_time)
            && fire_once(&mut last_cleanup, today, config.cleanup_time)
        {
            run_job(Job::Cleanup, manager, retention);
        }

        sleep_with_stop(config.poll_interval, stop);
    }
    info!("scheduler stopped");
}

fn run_job(job: Job, manager: &BackupManager, retention: &RetentionManager) {
    match job {
        Job::FullBackup => match manager.create_full_backup() {
            Ok(metadata) => debug!(backup_id = %metadata.backup_id, "scheduled backup done"),
            Err(err) => warn!(%err, "scheduled backup failed"),
        },
        Job::Cleanup => match retention.cleanup_old_backups() {
            Ok(report) => debug!(removed = report.removed.len(), "scheduled cleanup done"),
            Err(err) => warn!(%err, "scheduled cleanup failed"),
        },
    }
}

/// Minute-granularity wall-clock match.
fn minute_matches(now: NaiveTime, scheduled: NaiveTime) -> bool {
    use chrono::Timelike;
    now.hour() == scheduled.hour() && now.minute() == scheduled.minute()
}

fn day_enabled(today: Weekday, days: Option<&[Weekday]>) -> bool {
    days.map(|d| d.contains(&today)).unwrap_or(true)
}

/// Latches a job so it fires at most once per matching minute.
fn fire_once(last: &mut Option<(NaiveDate, u32)>, today: NaiveDate, scheduled: NaiveTime) -> bool {
    use chrono::Timelike;
    let key = (today, scheduled.hour() * 60 + scheduled.minute());
    if *last == Some(key) {
        return false;
    }
    *last = Some(key);
    true
}

/// Sleeps in short slices so a stop request is honored promptly.
fn sleep_with_stop(total: Duration, stop: &AtomicBool) {
    let slice = Duration::from_millis(100);
    let mut remaining = total;
    while remaining > Duration::ZERO && !stop.load(Ordering::SeqCst) {
        let nap = remaining.min(slice);
        thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::MetadataStore;
    use crate::config::{BackupConfig, RetentionPolicy, ScheduleConfig};
    use chrono::Timelike;
    use std::time::Instant;
    use tempfile::tempdir;
    use txvault_storage::{row, FileEngine, Statement, StorageEngine, Value};

    #[test]
    fn minute_matching() {
        let at = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();
        assert!(minute_matches(at(2, 30, 0), at(2, 30, 0)));
        assert!(minute_matches(at(2, 30, 59), at(2, 30, 0)));
        assert!(!minute_matches(at(2, 31, 0), at(2, 30, 0)));
    }

    #[test]
    fn fire_once_latches_per_minute() {
        let today = Local::now().date_naive();
        let at = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let mut last = None;
        assert!(fire_once(&mut last, today, at));
        assert!(!fire_once(&mut last, today, at));
        // A different minute fires again.
        let later = NaiveTime::from_hms_opt(2, 31, 0).unwrap();
        assert!(fire_once(&mut last, today, later));
    }

    #[test]
    fn day_filter() {
        assert!(day_enabled(Weekday::Mon, None));
        assert!(day_enabled(Weekday::Mon, Some(&[Weekday::Mon, Weekday::Fri])));
        assert!(!day_enabled(Weekday::Tue, Some(&[Weekday::Mon, Weekday::Fri])));
    }

    #[test]
    fn scheduler_fires_a_due_backup_and_stops_cleanly() {
        let dir = tempdir().unwrap();
        let live_path = dir.path().join("store.tvdb");
        let backup_dir = dir.path().join("backups");

        let engine = Arc::new(FileEngine::open(&live_path).unwrap());
        engine
            .apply_batch(&[Statement::Insert {
                table: "users".into(),
                row: row([("name", Value::from("ada"))]),
            }
            .into()])
            .unwrap();

        let store =
            Arc::new(MetadataStore::open(&dir.path().join("backup_metadata.json")).unwrap());
        let manager = Arc::new(BackupManager::new(
            engine,
            &live_path,
            &backup_dir,
            Arc::clone(&store),
            BackupConfig::new().validate_on_create(false),
        ));
        let retention = Arc::new(RetentionManager::new(
            Arc::clone(&store),
            &backup_dir,
            RetentionPolicy::default(),
        ));

        // Avoid racing a minute rollover right at the boundary.
        if Local::now().time().second() >= 57 {
            thread::sleep(Duration::from_secs(4));
        }
        let this_minute = Local::now().time().with_second(0).unwrap();
        let config = ScheduleConfig::new(this_minute, this_minute)
            .poll_interval(Duration::from_millis(20));

        let mut scheduler = schedule_automated_backups(manager, retention, config);

        let deadline = Instant::now() + Duration::from_secs(5);
        while store.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert_eq!(store.len(), 1, "exactly one backup per matching minute");
    }
}
