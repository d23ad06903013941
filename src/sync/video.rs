//! Video track scheduler
//!
//! Video establishes the session's zero point: `initialize` resets the
//! master clock, so every track's timestamp comparisons count from the
//! moment video playback begins. Release timing anchors on the presentation
//! timestamp of the texture-bearing sub-stream within each decoded bundle,
//! not an aggregate over the planes.

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::output::VideoOutput;
use crate::sync::clock::MasterClock;
use crate::sync::health::SyncHealth;
use crate::sync::ring::Consumer;
use crate::sync::service::{Gate, SchedulerService, gate_sample};
use crate::sync::types::{Sample, VideoBundle};

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Scheduler releasing decoded video bundles against the master clock
pub struct VideoScheduler {
    clock: MasterClock,
    input: Consumer<Sample<VideoBundle>>,
    output: Option<Arc<dyn VideoOutput>>,
    /// Tolerance window ("jitter" in session configuration)
    jitter: Duration,
    health: Arc<SyncHealth>,
    released: u64,
    last_stats_log: Instant,
}

impl VideoScheduler {
    /// Create a new video scheduler
    pub fn new(
        clock: MasterClock,
        input: Consumer<Sample<VideoBundle>>,
        output: Option<Arc<dyn VideoOutput>>,
        jitter: Duration,
        health: Arc<SyncHealth>,
    ) -> Self {
        Self {
            clock,
            input,
            output,
            jitter,
            health,
            released: 0,
            last_stats_log: Instant::now(),
        }
    }

    fn deliver(&mut self, sample: Sample<VideoBundle>) {
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
impl SchedulerService for VideoScheduler {
    async fn initialize(&mut self) -> Result<()> {
        // The video track owns the session's zero point.
        self.clock.reset();
        info!("VideoScheduler: master clock reset");
        Ok(())
    }

    async fn idle(&mut self) -> Result<()> {
        loop {
            // Anchor on the texture plane's timestamp; bundles without a
            // texture plane fall back to the sample timestamp.
            let pts = match self.input.peek() {
                Some(sample) => sample.payload().anchor_pts().unwrap_or(sample.pts()),
                None => break,
            };

            match gate_sample("VideoScheduler", pts, &self.clock, self.jitter, &self.health) {
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
                "VideoScheduler: {} released, {} queued",
                self.released,
                self.input.len()
            );
            self.last_stats_log = Instant::now();
        }

        Ok(())
    }

    async fn finalize(&mut self) {
        self.input.clear();
        info!("VideoScheduler: finished ({} released)", self.released);
    }

    fn name(&self) -> &'static str {
        "VideoScheduler"
    }
}
