//! Playback session orchestrator
//!
//! Owns the master clock and the three per-track scheduler tasks, and
//! starts/stops them together. Decoders feed samples through the
//! [`SessionFeeds`] producer endpoints handed out by [`PlaybackSession::start`];
//! each scheduler releases due samples to its output interface. Stopping
//! cancels the schedulers, which close and clear their input queues before
//! their tasks are joined, so no stale samples leak into the next session.

use anyhow::{Result, bail};
use futures_util::future::join_all;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::output::{AudioOutput, HapticOutput, VideoOutput};
use crate::sync::audio::AudioScheduler;
use crate::sync::clock::MasterClock;
use crate::sync::haptic::HapticScheduler;
use crate::sync::health::{HealthSummary, SyncHealth};
use crate::sync::ring::{self, Producer};
use crate::sync::service::run_service;
use crate::sync::types::{AudioFrame, HapticEvent, Sample, VideoBundle};
use crate::sync::video::VideoScheduler;

/// Periodic step interval for the scheduler services
const SCHEDULER_TICK: Duration = Duration::from_millis(1);

/// Health log interval while a session runs
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Decoder-side producer endpoints for a running session
///
/// Each endpoint is single-producer by construction: exactly one decoder
/// thread may push into each feed.
pub struct SessionFeeds {
    pub audio: Producer<Sample<AudioFrame>>,
    pub video: Producer<Sample<VideoBundle>>,
    pub haptic: Producer<Sample<HapticEvent>>,
}

struct RunningSession {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<Result<()>>)>,
    started_at: Instant,
}

/// Orchestrates the three track schedulers over one shared master clock
pub struct PlaybackSession {
    config: SessionConfig,
    clock: MasterClock,
    health: Arc<SyncHealth>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    video_output: Option<Arc<dyn VideoOutput>>,
    haptic_output: Option<Arc<dyn HapticOutput>>,
    running: Option<RunningSession>,
}

impl PlaybackSession {
    /// Create a session with default configuration and no outputs attached
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            clock: MasterClock::new(),
            health: Arc::new(SyncHealth::new()),
            audio_output: None,
            video_output: None,
            haptic_output: None,
            running: None,
        }
    }

    /// Apply a session configuration; rejected while the session runs
    pub fn configure(&mut self, config: SessionConfig) -> Result<()> {
        if self.running.is_some() {
            bail!("cannot reconfigure a running session");
        }
        if config.audio_queue == 0 || config.video_queue == 0 || config.haptic_queue == 0 {
            bail!(
                "queue capacities must be non-zero (audio {}, video {}, haptic {})",
                config.audio_queue,
                config.video_queue,
                config.haptic_queue
            );
        }
        self.clock.set_force_synchro(config.force_decoders_synchro);
        self.config = config;
        Ok(())
    }

    /// Attach the audio output interface (samples are discarded if unset)
    pub fn set_audio_output(&mut self, output: Arc<dyn AudioOutput>) {
        self.audio_output = Some(output);
    }

    /// Attach the video output interface
    pub fn set_video_output(&mut self, output: Arc<dyn VideoOutput>) {
        self.video_output = Some(output);
    }

    /// Attach the haptic output interface
    pub fn set_haptic_output(&mut self, output: Arc<dyn HapticOutput>) {
        self.haptic_output = Some(output);
    }

    /// The shared master clock
    pub fn clock(&self) -> &MasterClock {
        &self.clock
    }

    /// Snapshot of the session's health metrics
    pub fn health(&self) -> HealthSummary {
        self.health.summary()
    }

    /// True while the scheduler tasks are running
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Time since the session started
    pub fn running_duration(&self) -> Option<Duration> {
        self.running.as_ref().map(|r| r.started_at.elapsed())
    }

    /// Start the session: open fresh queues and spawn all three schedulers
    ///
    /// Returns the producer endpoints for the decoder side. Queues from any
    /// previous session were already closed and cleared by [`Self::stop`].
    pub fn start(&mut self) -> Result<SessionFeeds> {
        if self.running.is_some() {
            bail!("session already running");
        }

        self.clock.set_force_synchro(self.config.force_decoders_synchro);
        self.clock.reset();

        let (audio_tx, audio_rx) = ring::bounded(self.config.audio_queue);
        let (video_tx, video_rx) = ring::bounded(self.config.video_queue);
        let (haptic_tx, haptic_rx) = ring::bounded(self.config.haptic_queue);

        let audio = AudioScheduler::new(
            self.clock.clone(),
            audio_rx,
            self.audio_output.clone(),
            self.config.latency(),
            self.health.clone(),
        );
        let video = VideoScheduler::new(
            self.clock.clone(),
            video_rx,
            self.video_output.clone(),
            self.config.jitter(),
            self.health.clone(),
        );
        let haptic = HapticScheduler::new(
            self.clock.clone(),
            haptic_rx,
            self.haptic_output.clone(),
            self.config.latency(),
            self.health.clone(),
        );

        let cancel = CancellationToken::new();
        let tasks = vec![
            (
                "AudioScheduler",
                tokio::spawn(run_service(audio, cancel.clone(), SCHEDULER_TICK)),
            ),
            (
                "VideoScheduler",
                tokio::spawn(run_service(video, cancel.clone(), SCHEDULER_TICK)),
            ),
            (
                "HapticScheduler",
                tokio::spawn(run_service(haptic, cancel.clone(), SCHEDULER_TICK)),
            ),
        ];

        // Periodic health log, cancelled with the session.
        let health = self.health.clone();
        let health_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
            interval.tick().await; // immediate first tick
            loop {
                tokio::select! {
                    _ = health_cancel.cancelled() => break,
                    _ = interval.tick() => info!("{}", health.summary()),
                }
            }
        });

        self.running = Some(RunningSession {
            cancel,
            tasks,
            started_at: Instant::now(),
        });
        info!(
            "PlaybackSession: started (latency {:?}, jitter {:?}, synchro {})",
            self.config.latency(),
            self.config.jitter(),
            self.config.force_decoders_synchro
        );

        Ok(SessionFeeds {
            audio: audio_tx,
            video: video_tx,
            haptic: haptic_tx,
        })
    }

    /// Stop the session: cancel all schedulers and join their tasks
    ///
    /// Each scheduler finalizes by clearing its input queue; this method
    /// waits for every track before returning. Stopping a stopped session
    /// is a no-op.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.cancel.cancel();

        let (names, handles): (Vec<_>, Vec<_>) = running.tasks.into_iter().unzip();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(Ok(())) => info!("PlaybackSession: {name} stopped"),
                Ok(Err(e)) => warn!("PlaybackSession: {name} had terminated early: {e:#}"),
                Err(e) => error!("PlaybackSession: {name} task panicked: {e}"),
            }
        }

        info!(
            "PlaybackSession: stopped after {:?} ({})",
            running.started_at.elapsed(),
            self.health.summary()
        );
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NullOutput;
    use crate::sync::types::{PlaneKind, PlanePacket, Timestamp};
    use bytes::Bytes;
    use std::sync::Mutex;

    struct VideoRecorder {
        pts: Mutex<Vec<i64>>,
    }

    impl VideoRecorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                pts: Mutex::new(Vec::new()),
            })
        }

        fn released(&self) -> Vec<i64> {
            self.pts.lock().unwrap().clone()
        }
    }

    impl VideoOutput for VideoRecorder {
        fn on_sample_event(&self, sample: Sample<VideoBundle>) {
            self.pts.lock().unwrap().push(sample.pts().micros);
        }
    }

    fn video_sample(pts: Timestamp) -> Sample<VideoBundle> {
        let mut bundle = VideoBundle::new();
        bundle.set_plane(PlanePacket {
            kind: PlaneKind::Texture,
            data: Bytes::from_static(&[0u8; 16]),
            width: 4,
            height: 4,
            pts,
        });
        Sample::new(pts, bundle)
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut session = PlaybackSession::new();
        let _feeds = session.start().unwrap();
        assert!(session.is_running());
        assert!(session.start().is_err());
        session.stop().await;
    }

    #[tokio::test]
    async fn test_configure_while_running_fails() {
        let mut session = PlaybackSession::new();
        let _feeds = session.start().unwrap();
        assert!(session.configure(SessionConfig::default()).is_err());
        session.stop().await;
        assert!(session.configure(SessionConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_configure_rejects_zero_queue_capacity() {
        // A config file can legitimately deserialize a zero capacity; it has
        // to be rejected here, not panic at start.
        let config = SessionConfig::from_json_str(r#"{"AudioQueue": 0}"#).unwrap();
        let mut session = PlaybackSession::new();
        assert!(session.configure(config).is_err());

        for zeroed in [
            SessionConfig {
                video_queue: 0,
                ..Default::default()
            },
            SessionConfig {
                haptic_queue: 0,
                ..Default::default()
            },
        ] {
            assert!(session.configure(zeroed).is_err());
        }
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut session = PlaybackSession::new();
        session.stop().await;
        let _feeds = session.start().unwrap();
        session.stop().await;
        session.stop().await;
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_session_reset_isolation() {
        let mut session = PlaybackSession::new();
        session.set_video_output(Arc::new(NullOutput));

        // First session: leave queued samples and an accumulated offset.
        let mut feeds = session.start().unwrap();
        let far_future = session.clock().now().add(Duration::from_secs(60));
        feeds.video.push(video_sample(far_future)).unwrap();
        session.clock().update_offset(Duration::from_millis(250));
        session.stop().await;
        drop(feeds);

        // Second session starts clean: empty queues, zero offset.
        let feeds = session.start().unwrap();
        assert_eq!(session.clock().offset(), Duration::ZERO);
        assert!(feeds.audio.is_empty());
        assert!(feeds.video.is_empty());
        assert!(feeds.haptic.is_empty());
        session.stop().await;
    }

    #[tokio::test]
    async fn test_end_to_end_video_release() {
        let recorder = VideoRecorder::new();
        let mut session = PlaybackSession::new();
        session
            .configure(SessionConfig {
                force_decoders_synchro: true,
                latency_ms: 100,
                jitter_ms: 5,
                ..Default::default()
            })
            .unwrap();
        session.set_video_output(recorder.clone());

        let mut feeds = session.start().unwrap();

        // One video sample 2ms ahead: inside the 5ms jitter window, so it
        // is released on the next scheduler tick.
        let pts = session.clock().now().add(Duration::from_millis(2));
        feeds.video.push(video_sample(pts)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(recorder.released(), vec![pts.micros]);
        assert!(feeds.video.is_empty());

        session.stop().await;
    }

    #[tokio::test]
    async fn test_scheduler_failure_leaves_session_stoppable() {
        // A track with no output still consumes its queue; stopping joins
        // every task even when one had nothing to do.
        let mut session = PlaybackSession::new();
        let mut feeds = session.start().unwrap();

        let pts = session.clock().now();
        feeds.video.push(video_sample(pts)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // No output attached: popped and discarded, not stuck.
        assert!(feeds.video.is_empty());
        session.stop().await;
        assert!(!session.is_running());
    }
}
