//! Master clock shared by all track schedulers
//!
//! Provides the session's notion of "now" that audio, video and haptic
//! schedulers compare presentation timestamps against. When a scheduler
//! observes a sample that is already late, it pulls the clock backward by
//! the lag through [`MasterClock::update_offset`]; because the offset is
//! shared, a correction triggered by one slow track re-aligns the other
//! two as well. Corrections accumulate permanently: once a stream has
//! fallen behind, the clock concedes the delay rather than dropping
//! samples to catch up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use super::types::Timestamp;

/// Process-wide logical clock, cloneable across scheduler tasks
///
/// # Thread Safety
///
/// Cloned handles share state through `Arc`; the offset and base use atomic
/// operations, so `update_offset` may be called concurrently from the three
/// scheduler tasks without locking.
#[derive(Clone)]
pub struct MasterClock {
    /// Fixed reference instant captured at construction
    epoch: Arc<Instant>,

    /// Microseconds from epoch to the current session's zero point
    base_micros: Arc<AtomicI64>,

    /// Accumulated late-sample correction (microseconds)
    offset_micros: Arc<AtomicI64>,

    /// Whether decoders are forced into mutual sync
    force_synchro: Arc<AtomicBool>,
}

impl MasterClock {
    /// Create a new clock with its session zero point at "now"
    pub fn new() -> Self {
        Self {
            epoch: Arc::new(Instant::now()),
            base_micros: Arc::new(AtomicI64::new(0)),
            offset_micros: Arc::new(AtomicI64::new(0)),
            force_synchro: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Current session time
    ///
    /// `elapsed - offset` while synchro is forced; raw elapsed otherwise,
    /// in which case each track effectively runs on its own unsynced clock.
    pub fn now(&self) -> Timestamp {
        let elapsed =
            self.epoch.elapsed().as_micros() as i64 - self.base_micros.load(Ordering::Relaxed);
        if self.force_synchro.load(Ordering::Relaxed) {
            Timestamp::from_micros(elapsed - self.offset_micros.load(Ordering::Relaxed))
        } else {
            Timestamp::from_micros(elapsed)
        }
    }

    /// Accumulate a late-sample correction
    ///
    /// Pulls the clock backward by `delta` so subsequent comparisons treat
    /// the lagging stream as on-time. There is no way to revert a
    /// correction once applied.
    pub fn update_offset(&self, delta: Duration) {
        self.offset_micros
            .fetch_add(delta.as_micros() as i64, Ordering::Relaxed);
    }

    /// Accumulated correction
    pub fn offset(&self) -> Duration {
        let micros = self.offset_micros.load(Ordering::Relaxed);
        Duration::from_micros(micros.max(0) as u64)
    }

    /// Clear the offset and recapture the session zero point
    ///
    /// Called once per media session before any scheduler starts comparing
    /// timestamps.
    pub fn reset(&self) {
        self.base_micros
            .store(self.epoch.elapsed().as_micros() as i64, Ordering::Relaxed);
        self.offset_micros.store(0, Ordering::Relaxed);
    }

    /// Switch mutual decoder synchronization on or off
    pub fn set_force_synchro(&self, force: bool) {
        self.force_synchro.store(force, Ordering::Relaxed);
    }

    /// Whether decoders are forced into mutual sync
    pub fn force_synchro(&self) -> bool {
        self.force_synchro.load(Ordering::Relaxed)
    }
}

impl Default for MasterClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MasterClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterClock")
            .field("now", &self.now())
            .field("offset", &self.offset())
            .field("force_synchro", &self.force_synchro())
            .finish()
    }
}
