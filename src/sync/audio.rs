//! Audio track scheduler
//!
//! Audio is delivered through a separate device clock once started, so the
//! one place this scheduler can establish phase is the very first sample:
//! `initialize` waits for it, sleeps out the startup delay that aligns its
//! timestamp with `now()` plus the configured latency, and releases it.
//! From then on the periodic `idle` step releases samples whose timestamps
//! fall inside the latency window.

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::output::AudioOutput;
use crate::sync::clock::MasterClock;
use crate::sync::health::SyncHealth;
use crate::sync::ring::Consumer;
use crate::sync::service::{Gate, SchedulerService, gate_sample};
use crate::sync::types::{AudioFrame, Sample};

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Scheduler releasing decoded audio frames against the master clock
pub struct AudioScheduler {
    clock: MasterClock,
    input: Consumer<Sample<AudioFrame>>,
    output: Option<Arc<dyn AudioOutput>>,
    /// Tolerance window: samples this close to "now" are due
    latency: Duration,
    health: Arc<SyncHealth>,
    released: u64,
    last_stats_log: Instant,
}

impl AudioScheduler {
    /// Create a new audio scheduler
    pub fn new(
        clock: MasterClock,
        input: Consumer<Sample<AudioFrame>>,
        output: Option<Arc<dyn AudioOutput>>,
        latency: Duration,
        health: Arc<SyncHealth>,
    ) -> Self {
        Self {
            clock,
            input,
            output,
            latency,
            health,
            released: 0,
            last_stats_log: Instant::now(),
        }
    }

    fn deliver(&mut self, sample: Sample<AudioFrame>) {
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
impl SchedulerService for AudioScheduler {
    async fn initialize(&mut self) -> Result<()> {
        // Wait for the first decoded sample (the loop driver races this
        // against session cancellation).
        let first = loop {
            match self.input.pop() {
                Some(sample) => break sample,
                None if self.input.is_closed() => {
                    info!("AudioScheduler: input closed before first sample");
                    return Ok(());
                }
                None => tokio::time::sleep(Duration::from_millis(1)).await,
            }
        };

        // One-shot startup delay: sleep until the first sample enters the
        // latency window, the same instant the idle gate would release it.
        let dt = first.pts().delta_micros(self.clock.now());
        let delay_micros = dt - self.latency.as_micros() as i64;
        if delay_micros > 0 {
            let delay = Duration::from_micros(delay_micros as u64);
            info!("AudioScheduler: startup delay {delay:?} (first pts {})", first.pts());
            tokio::time::sleep(delay).await;
        }

        self.deliver(first);
        Ok(())
    }

    async fn idle(&mut self) -> Result<()> {
        loop {
            let pts = match self.input.peek() {
                Some(sample) => sample.pts(),
                None => break,
            };

            match gate_sample("AudioScheduler", pts, &self.clock, self.latency, &self.health) {
                Gate::Release => {
                    if let Some(sample) = self.input.pop() {
                        self.deliver(sample);
                    }
                }
                Gate::Hold => break,
            }
        }

        if self.last_stats_log.elapsed() >= STATS_LOG_INTERVAL {
            info!(
                "AudioScheduler: {} released, {} queued",
                self.released,
                self.input.len()
            );
            self.last_stats_log = Instant::now();
        }

        Ok(())
    }

    async fn finalize(&mut self) {
        self.input.clear();
        info!("AudioScheduler: finished ({} released)", self.released);
    }

    fn name(&self) -> &'static str {
        "AudioScheduler"
    }
}
