//! Haptic track scheduler
//!
//! The haptic decoder can emit several keyframes of one effect out of
//! temporal order, so samples are first drained from the input ring into an
//! ordered buffer and only then gated against the master clock. Actuation
//! events therefore reach the output interface in ascending start-timestamp
//! order regardless of arrival order.

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::output::HapticOutput;
use crate::sync::buffer::OrderedBuffer;
use crate::sync::clock::MasterClock;
use crate::sync::health::SyncHealth;
use crate::sync::ring::Consumer;
use crate::sync::service::{Gate, SchedulerService, gate_sample};
use crate::sync::types::{HapticEvent, Sample};

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Scheduler releasing decoded haptic events against the master clock
pub struct HapticScheduler {
    clock: MasterClock,
    input: Consumer<Sample<HapticEvent>>,
    buffer: OrderedBuffer<HapticEvent>,
    output: Option<Arc<dyn HapticOutput>>,
    /// Tolerance window (shares the session's audio latency setting)
    latency: Duration,
    health: Arc<SyncHealth>,
    released: u64,
    last_stats_log: Instant,
}

impl HapticScheduler {
    /// Create a new haptic scheduler
    pub fn new(
        clock: MasterClock,
        input: Consumer<Sample<HapticEvent>>,
        output: Option<Arc<dyn HapticOutput>>,
        latency: Duration,
        health: Arc<SyncHealth>,
    ) -> Self {
        let capacity = input.capacity();
        Self {
            clock,
            input,
            buffer: OrderedBuffer::with_capacity(capacity),
            output,
            latency,
            health,
            released: 0,
            last_stats_log: Instant::now(),
        }
    }

    fn deliver(&mut self, sample: Sample<HapticEvent>) {
        match &self.output {
            Some(output) => {
                output.on_sample_event(sample);
                self.health.record_release();
                self.released += 1;
            }
            None => self.health.record_discard(),
        }
    }
}

#[async_trait]
impl SchedulerService for HapticScheduler {
    async fn idle(&mut self) -> Result<()> {
        // Re-sort arrivals by start timestamp before gating. Re-key each
        // sample on the event's actuation start so ordering and release do
        // not depend on the pts the producer stamped.
        while let Some(sample) = self.input.pop() {
            let event = sample.into_payload();
            self.buffer.insert(Sample::new(event.start, event));
        }

        loop {
            let pts = match self.buffer.front_pts() {
                Some(pts) => pts,
                None => break,
            };

            match gate_sample("HapticScheduler", pts, &self.clock, self.latency, &self.health) {
                Gate::Release => {
                    if let Some(sample) = self.buffer.pop_front() {
                        self.deliver(sample);
                    }
                }
                Gate::Hold => break,
            }
        }

        if self.last_stats_log.elapsed() >= STATS_LOG_INTERVAL {
            info!(
                "HapticScheduler: {} released, {} buffered",
                self.released,
                self.buffer.len()
            );
            self.last_stats_log = Instant::now();
        }

        Ok(())
    }

    async fn finalize(&mut self) {
        self.input.clear();
        self.buffer.clear();
        info!("HapticScheduler: finished ({} released)", self.released);
    }

    fn name(&self) -> &'static str {
        "HapticScheduler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ring;
    use crate::sync::types::Timestamp;
    use bytes::Bytes;
    use std::sync::Mutex;

    struct Recorder {
        starts: Mutex<Vec<i64>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                starts: Mutex::new(Vec::new()),
            })
        }

        fn released(&self) -> Vec<i64> {
            self.starts.lock().unwrap().clone()
        }
    }

    impl HapticOutput for Recorder {
        fn on_sample_event(&self, sample: Sample<HapticEvent>) {
            self.starts.lock().unwrap().push(sample.payload().start.micros);
        }
    }

    fn event(start: Timestamp) -> Sample<HapticEvent> {
        Sample::new(
            start,
            HapticEvent {
                start,
                end: start.add(Duration::from_millis(50)),
                intensity_min: 0.1,
                intensity_max: 0.9,
                data: Bytes::from_static(&[0u8; 8]),
            },
        )
    }

    fn scheduler(
        latency: Duration,
        output: Arc<Recorder>,
    ) -> (
        HapticScheduler,
        ring::Producer<Sample<HapticEvent>>,
        MasterClock,
    ) {
        let clock = MasterClock::new();
        clock.reset();
        let health = Arc::new(SyncHealth::new());
        let (tx, rx) = ring::bounded(16);
        let sched = HapticScheduler::new(clock.clone(), rx, Some(output), latency, health);
        (sched, tx, clock)
    }

    #[tokio::test]
    async fn test_out_of_order_arrivals_released_in_order() {
        let recorder = Recorder::new();
        let (mut sched, mut tx, clock) = scheduler(Duration::from_millis(100), recorder.clone());

        // Arrive as [5ms, 1ms, 3ms]; all inside the window.
        let base = clock.now();
        for offset_ms in [5i64, 1, 3] {
            tx.push(event(base.add(Duration::from_millis(offset_ms as u64))))
                .unwrap();
        }

        sched.idle().await.unwrap();

        let released = recorder.released();
        assert_eq!(released.len(), 3);
        assert!(released[0] < released[1] && released[1] < released[2]);
    }

    #[tokio::test]
    async fn test_future_events_stay_buffered_in_order() {
        let recorder = Recorder::new();
        let (mut sched, mut tx, clock) = scheduler(Duration::from_millis(10), recorder.clone());

        // Out of order, all far in the future: drained into the ordered
        // buffer but not released.
        let base = clock.now().add(Duration::from_secs(1));
        tx.push(event(base.add(Duration::from_millis(20)))).unwrap();
        tx.push(event(base)).unwrap();

        sched.idle().await.unwrap();

        assert!(recorder.released().is_empty());
        assert!(sched.input.is_empty());
        assert_eq!(sched.buffer.len(), 2);
        assert_eq!(sched.buffer.front_pts().unwrap(), base);
    }

    #[tokio::test]
    async fn test_ordering_follows_event_start_not_sample_pts() {
        let recorder = Recorder::new();
        let (mut sched, mut tx, clock) = scheduler(Duration::from_millis(100), recorder.clone());

        // Sample pts and actuation start disagree; release order must follow
        // the starts.
        let base = clock.now();
        let early_start = base.add(Duration::from_millis(2));
        let late_start = base.add(Duration::from_millis(50));
        let mk = |pts: Timestamp, start: Timestamp| {
            Sample::new(
                pts,
                HapticEvent {
                    start,
                    end: start.add(Duration::from_millis(30)),
                    intensity_min: 0.1,
                    intensity_max: 0.9,
                    data: Bytes::from_static(&[0u8; 8]),
                },
            )
        };
        tx.push(mk(base.add(Duration::from_millis(1)), late_start)).unwrap();
        tx.push(mk(base.add(Duration::from_millis(90)), early_start)).unwrap();

        sched.idle().await.unwrap();

        assert_eq!(
            recorder.released(),
            vec![early_start.micros, late_start.micros]
        );
    }

    #[tokio::test]
    async fn test_late_event_absorbed_and_released() {
        let recorder = Recorder::new();
        let (mut sched, mut tx, clock) = scheduler(Duration::from_millis(10), recorder.clone());

        let pts = clock.now().sub(Duration::from_millis(40));
        tx.push(event(pts)).unwrap();

        sched.idle().await.unwrap();

        assert_eq!(recorder.released().len(), 1);
        assert!(clock.offset() >= Duration::from_millis(39));
    }

    #[tokio::test]
    async fn test_finalize_clears_buffer() {
        let recorder = Recorder::new();
        let (mut sched, mut tx, clock) = scheduler(Duration::from_millis(10), recorder.clone());

        tx.push(event(clock.now().add(Duration::from_secs(5)))).unwrap();
        sched.idle().await.unwrap();
        assert_eq!(sched.buffer.len(), 1);

        sched.finalize().await;
        assert!(sched.buffer.is_empty());
    }
}
