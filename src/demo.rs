//! Synthetic playback demo
//!
//! Stands in for the real MIV/V-PCC decode pipeline: three generator tasks
//! produce timestamped audio frames, video bundles and (deliberately
//! out-of-order) haptic events into a session's feeds, and console outputs
//! log what the schedulers release. Useful for watching the engine keep the
//! tracks aligned without any media assets.

use anyhow::Result;
use bytes::Bytes;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::output::ConsoleOutput;
use crate::session::PlaybackSession;
use crate::sync::clock::MasterClock;
use crate::sync::ring::Producer;
use crate::sync::types::{
    AudioFrame, HapticEvent, PlaneKind, PlanePacket, Sample, Timestamp, VideoBundle,
};

const AUDIO_FRAME_INTERVAL: Duration = Duration::from_millis(20);
const VIDEO_FRAME_INTERVAL: Duration = Duration::from_millis(40);
const HAPTIC_BURST_INTERVAL: Duration = Duration::from_millis(200);

/// How far ahead of the clock the generators timestamp their samples
const GENERATOR_LEAD: Duration = Duration::from_millis(60);

fn audio_frame(pts: Timestamp) -> Sample<AudioFrame> {
    // 20ms of 48kHz stereo s16le
    Sample::new(
        pts,
        AudioFrame {
            data: Bytes::from(vec![0u8; 960 * 2 * 2]),
            sample_rate: 48_000,
            channels: 2,
        },
    )
}

fn video_bundle(pts: Timestamp) -> Sample<VideoBundle> {
    let mut bundle = VideoBundle::new();
    for kind in [
        PlaneKind::Occupancy,
        PlaneKind::Geometry,
        PlaneKind::Texture,
        PlaneKind::Transparency,
    ] {
        bundle.set_plane(PlanePacket {
            kind,
            data: Bytes::from(vec![0u8; 256]),
            width: 16,
            height: 16,
            pts,
        });
    }
    Sample::new(pts, bundle)
}

fn haptic_event(start: Timestamp) -> Sample<HapticEvent> {
    Sample::new(
        start,
        HapticEvent {
            start,
            end: start.add(Duration::from_millis(30)),
            intensity_min: 0.2,
            intensity_max: 0.8,
            data: Bytes::from(vec![0u8; 16]),
        },
    )
}

fn push_or_drop<P>(feed: &mut Producer<Sample<P>>, sample: Sample<P>, track: &str) {
    // Backpressure is the producer's concern; the demo simply drops.
    if feed.push(sample).is_err() {
        warn!("{track} generator: queue full, dropping sample");
    }
}

async fn run_audio_generator(
    mut feed: Producer<Sample<AudioFrame>>,
    clock: MasterClock,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(AUDIO_FRAME_INTERVAL);
    let mut pts = clock.now().add(GENERATOR_LEAD);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                push_or_drop(&mut feed, audio_frame(pts), "audio");
                pts = pts.add(AUDIO_FRAME_INTERVAL);
            }
        }
    }
}

async fn run_video_generator(
    mut feed: Producer<Sample<VideoBundle>>,
    clock: MasterClock,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(VIDEO_FRAME_INTERVAL);
    let mut pts = clock.now().add(GENERATOR_LEAD);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                push_or_drop(&mut feed, video_bundle(pts), "video");
                pts = pts.add(VIDEO_FRAME_INTERVAL);
            }
        }
    }
}

async fn run_haptic_generator(
    mut feed: Producer<Sample<HapticEvent>>,
    clock: MasterClock,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(HAPTIC_BURST_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                // Emit each burst out of temporal order, the way a haptic
                // decoder emits the keyframes of one effect.
                let base = clock.now().add(GENERATOR_LEAD);
                for offset_ms in [60u64, 20, 40] {
                    push_or_drop(
                        &mut feed,
                        haptic_event(base.add(Duration::from_millis(offset_ms))),
                        "haptic",
                    );
                }
            }
        }
    }
}

/// Run a synthetic session for `duration`
pub async fn run(config: SessionConfig, duration: Duration) -> Result<()> {
    let mut session = PlaybackSession::new();
    session.configure(config)?;

    let console = Arc::new(ConsoleOutput);
    session.set_audio_output(console.clone());
    session.set_video_output(console.clone());
    session.set_haptic_output(console);

    let feeds = session.start()?;
    let clock = session.clock().clone();

    let cancel = CancellationToken::new();
    let generators = [
        tokio::spawn(run_audio_generator(feeds.audio, clock.clone(), cancel.clone())),
        tokio::spawn(run_video_generator(feeds.video, clock.clone(), cancel.clone())),
        tokio::spawn(run_haptic_generator(feeds.haptic, clock, cancel.clone())),
    ];

    info!("demo: playing for {duration:?}");
    tokio::time::sleep(duration).await;

    cancel.cancel();
    for generator in generators {
        let _ = generator.await;
    }
    session.stop().await;

    info!("demo: {}", session.health());
    Ok(())
}
