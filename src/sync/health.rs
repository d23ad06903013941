//! Health monitoring and metrics for playback sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Health metrics for a playback session
///
/// Tracks release/discard counters and late-sample corrections across all
/// three schedulers. All fields use atomic operations for thread-safe access
/// from the scheduler tasks.
pub struct SyncHealth {
    /// Samples released to an output interface
    pub samples_released: AtomicU64,

    /// Samples popped and discarded because no output interface was attached
    pub samples_discarded: AtomicU64,

    /// Late-sample corrections applied to the master clock
    pub late_corrections: AtomicU64,

    /// Total lateness absorbed into the clock offset (microseconds)
    pub late_micros: AtomicU64,

    /// Timestamp (Unix microseconds) of the last released sample
    pub last_release_time: AtomicU64,
}

fn unix_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

impl SyncHealth {
    /// Create a new health metrics instance
    pub fn new() -> Self {
        Self {
            samples_released: AtomicU64::new(0),
            samples_discarded: AtomicU64::new(0),
            late_corrections: AtomicU64::new(0),
            late_micros: AtomicU64::new(0),
            last_release_time: AtomicU64::new(unix_micros()),
        }
    }

    /// Record a sample released to an output interface
    pub fn record_release(&self) {
        self.samples_released.fetch_add(1, Ordering::Relaxed);
        self.last_release_time.store(unix_micros(), Ordering::Relaxed);
    }

    /// Record a sample discarded for lack of an output interface
    pub fn record_discard(&self) {
        self.samples_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a late-sample correction of the given magnitude
    pub fn record_late_correction(&self, lag: Duration) {
        self.late_corrections.fetch_add(1, Ordering::Relaxed);
        self.late_micros
            .fetch_add(lag.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get the number of released samples
    pub fn samples_released(&self) -> u64 {
        self.samples_released.load(Ordering::Relaxed)
    }

    /// Get the number of discarded samples
    pub fn samples_discarded(&self) -> u64 {
        self.samples_discarded.load(Ordering::Relaxed)
    }

    /// Get the number of late-sample corrections
    pub fn late_corrections(&self) -> u64 {
        self.late_corrections.load(Ordering::Relaxed)
    }

    /// Get the total absorbed lateness
    pub fn late_total(&self) -> Duration {
        Duration::from_micros(self.late_micros.load(Ordering::Relaxed))
    }

    /// Check if playback has stalled (no releases for the given duration)
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        let last = self.last_release_time.load(Ordering::Relaxed);
        let elapsed = unix_micros().saturating_sub(last);
        elapsed > threshold.as_micros() as u64
    }

    /// Get a summary of health metrics
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            samples_released: self.samples_released(),
            samples_discarded: self.samples_discarded(),
            late_corrections: self.late_corrections(),
            late_total: self.late_total(),
        }
    }
}

impl Default for SyncHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub samples_released: u64,
    pub samples_discarded: u64,
    pub late_corrections: u64,
    pub late_total: Duration,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} released, {} discarded, {} late corrections ({:?} absorbed)",
            self.samples_released, self.samples_discarded, self.late_corrections, self.late_total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_counters() {
        let health = SyncHealth::new();

        health.record_release();
        health.record_release();
        health.record_discard();
        health.record_late_correction(Duration::from_millis(40));
        health.record_late_correction(Duration::from_millis(10));

        assert_eq!(health.samples_released(), 2);
        assert_eq!(health.samples_discarded(), 1);
        assert_eq!(health.late_corrections(), 2);
        assert_eq!(health.late_total(), Duration::from_millis(50));
    }

    #[test]
    fn test_stall_detection() {
        let health = SyncHealth::new();
        assert!(!health.is_stalled(Duration::from_secs(1)));

        health.record_release();
        std::thread::sleep(Duration::from_millis(120));
        assert!(health.is_stalled(Duration::from_millis(100)));
    }
}
