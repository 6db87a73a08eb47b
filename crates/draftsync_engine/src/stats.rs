//! Sync statistics.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for the outcomes of one engine, safe to update concurrently.
///
/// `processed` is never stored; it is always the sum of the four outcome
/// counters. Drafts waiting for references are tracked by a separate gauge.
#[derive(Debug)]
pub struct SyncStatistics {
    resource_plural: &'static str,
    created: AtomicU64,
    updated: AtomicU64,
    up_to_date: AtomicU64,
    failed: AtomicU64,
    waiting: AtomicU64,
    timer: Mutex<Timer>,
}

#[derive(Debug, Default)]
struct Timer {
    started: Option<Instant>,
    accumulated: Duration,
}

impl SyncStatistics {
    /// Creates zeroed statistics for a family with the given plural name.
    pub fn new(resource_plural: &'static str) -> Self {
        Self {
            resource_plural,
            created: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            up_to_date: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            waiting: AtomicU64::new(0),
            timer: Mutex::new(Timer::default()),
        }
    }

    /// Counts one created resource.
    pub fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one updated resource.
    pub fn increment_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one resource that needed no change.
    pub fn increment_up_to_date(&self) {
        self.up_to_date.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one failed draft.
    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts `count` failed drafts.
    pub fn increment_failed_by(&self, count: u64) {
        self.failed.fetch_add(count, Ordering::Relaxed);
    }

    /// Sets the number of drafts waiting for references.
    pub fn set_waiting_to_be_resolved(&self, count: u64) {
        self.waiting.store(count, Ordering::Relaxed);
    }

    /// Returns the number of processed drafts.
    pub fn processed(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
            + self.updated.load(Ordering::Relaxed)
            + self.up_to_date.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
    }

    /// Starts timing a sync run.
    pub fn start_timer(&self) {
        self.timer.lock().started = Some(Instant::now());
    }

    /// Stops timing and adds the elapsed time to the total.
    pub fn stop_timer(&self) {
        let mut timer = self.timer.lock();
        if let Some(started) = timer.started.take() {
            timer.accumulated += started.elapsed();
        }
    }

    /// Returns the total processing time, including a running timer.
    pub fn processing_time(&self) -> Duration {
        let timer = self.timer.lock();
        match timer.started {
            Some(started) => timer.accumulated + started.elapsed(),
            None => timer.accumulated,
        }
    }

    /// Returns an immutable view of the current values.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            resource_plural: self.resource_plural,
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            up_to_date: self.up_to_date.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            waiting_to_be_resolved: self.waiting.load(Ordering::Relaxed),
            processing_time: self.processing_time(),
        }
    }
}

/// An immutable view of [`SyncStatistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    /// Plural name of the synced family.
    pub resource_plural: &'static str,
    /// Resources created.
    pub created: u64,
    /// Resources updated.
    pub updated: u64,
    /// Resources that needed no change.
    pub up_to_date: u64,
    /// Drafts that failed.
    pub failed: u64,
    /// Drafts currently waiting for references.
    pub waiting_to_be_resolved: u64,
    /// Total processing time.
    pub processing_time: Duration,
}

impl StatisticsSnapshot {
    /// Returns `created + updated + up_to_date + failed`.
    pub fn processed(&self) -> u64 {
        self.created + self.updated + self.up_to_date + self.failed
    }

    /// Returns the processing time in milliseconds.
    pub fn processing_time_millis(&self) -> u128 {
        self.processing_time.as_millis()
    }

    /// Returns the processing time split into days down to milliseconds.
    pub fn processing_time_breakdown(&self) -> ProcessingTime {
        ProcessingTime::from(self.processing_time)
    }

    /// Returns a one-line summary of the run.
    pub fn report_message(&self) -> String {
        format!(
            "Summary: {} {plural} were processed in total ({} created, {} updated, {} failed to sync and {} {plural} with missing references).",
            self.processed(),
            self.created,
            self.updated,
            self.failed,
            self.waiting_to_be_resolved,
            plural = self.resource_plural,
        )
    }
}

/// A duration split for display, e.g. `0d, 1h, 15m, 20s, 000ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingTime {
    /// Whole days.
    pub days: u64,
    /// Hours within the day.
    pub hours: u64,
    /// Minutes within the hour.
    pub minutes: u64,
    /// Seconds within the minute.
    pub seconds: u64,
    /// Milliseconds within the second.
    pub millis: u64,
}

impl From<Duration> for ProcessingTime {
    fn from(duration: Duration) -> Self {
        let total_secs = duration.as_secs();
        Self {
            days: total_secs / 86_400,
            hours: total_secs % 86_400 / 3_600,
            minutes: total_secs % 3_600 / 60,
            seconds: total_secs % 60,
            millis: u64::from(duration.subsec_millis()),
        }
    }
}

impl fmt::Display for ProcessingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d, {}h, {}m, {}s, {:03}ms",
            self.days, self.hours, self.minutes, self.seconds, self.millis
        )
    }
}
