//! Output interfaces consuming released samples
//!
//! One synchronous `on_sample_event` call per released sample, invoked from
//! the owning scheduler's own task; implementations buffer or render from
//! there and must not block indefinitely. Concrete backends (device audio,
//! GPU upload, actuator plugins) are selected at configuration time; a track
//! with no attached output has its samples popped and silently discarded.

use log::debug;

use crate::sync::types::{AudioFrame, HapticEvent, Sample, VideoBundle};

/// Consumer of released audio samples
pub trait AudioOutput: Send + Sync {
    fn on_sample_event(&self, sample: Sample<AudioFrame>);
}

/// Consumer of released video bundles
pub trait VideoOutput: Send + Sync {
    fn on_sample_event(&self, sample: Sample<VideoBundle>);
}

/// Consumer of released haptic events
pub trait HapticOutput: Send + Sync {
    fn on_sample_event(&self, sample: Sample<HapticEvent>);
}

/// Output that drops everything it receives
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn on_sample_event(&self, _sample: Sample<AudioFrame>) {}
}

impl VideoOutput for NullOutput {
    fn on_sample_event(&self, _sample: Sample<VideoBundle>) {}
}

impl HapticOutput for NullOutput {
    fn on_sample_event(&self, _sample: Sample<HapticEvent>) {}
}

/// Output that logs every released sample, used by the demo binary
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl AudioOutput for ConsoleOutput {
    fn on_sample_event(&self, sample: Sample<AudioFrame>) {
        let frame = sample.payload();
        debug!(
            "audio out: pts={} {}Hz x{} ({} bytes)",
            sample.pts(),
            frame.sample_rate,
            frame.channels,
            frame.data.len()
        );
    }
}

impl VideoOutput for ConsoleOutput {
    fn on_sample_event(&self, sample: Sample<VideoBundle>) {
        let bundle = sample.payload();
        debug!(
            "video out: pts={} {} planes ({} bytes)",
            sample.pts(),
            bundle.plane_count(),
            bundle.size()
        );
    }
}

impl HapticOutput for ConsoleOutput {
    fn on_sample_event(&self, sample: Sample<HapticEvent>) {
        let event = sample.payload();
        debug!(
            "haptic out: start={} end={} intensity {:.2}..{:.2}",
            event.start, event.end, event.intensity_min, event.intensity_max
        );
    }
}
