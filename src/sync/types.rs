//! Core types for the synchronization engine

use bytes::Bytes;
use std::time::Duration;

/// Timestamp representation for media samples
///
/// Microseconds since session start. Signed so that "how far in the future
/// is this sample" comparisons against the master clock can go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Microseconds since session start
    pub micros: i64,
}

impl Timestamp {
    /// Create a new timestamp from microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Create a timestamp from fractional seconds
    pub fn from_secs_f64(secs: f64) -> Self {
        Self {
            micros: (secs * 1_000_000.0) as i64,
        }
    }

    /// Create a timestamp from a duration since session start
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            micros: duration.as_micros() as i64,
        }
    }

    /// Convert to a duration (clamped at zero for pre-session timestamps)
    pub fn as_duration(&self) -> Duration {
        Duration::from_micros(self.micros.max(0) as u64)
    }

    /// Convert to fractional seconds
    pub fn as_secs_f64(&self) -> f64 {
        self.micros as f64 / 1_000_000.0
    }

    /// Add a duration to this timestamp
    pub fn add(&self, duration: Duration) -> Self {
        Self {
            micros: self.micros + duration.as_micros() as i64,
        }
    }

    /// Subtract a duration from this timestamp
    pub fn sub(&self, duration: Duration) -> Self {
        Self {
            micros: self.micros - duration.as_micros() as i64,
        }
    }

    /// Signed difference `self - other` in microseconds
    pub fn delta_micros(&self, other: Timestamp) -> i64 {
        self.micros - other.micros
    }

    /// Absolute difference between two timestamps
    pub fn diff(&self, other: Timestamp) -> Duration {
        Duration::from_micros((self.micros - other.micros).unsigned_abs())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}µs", self.micros)
    }
}

/// A decoded, time-stamped unit of one medium's content
///
/// Created by a decoder when a chunk finishes decoding, owned by the queue
/// while in transit, consumed when handed to the output interface. The
/// presentation timestamp is immutable after construction.
#[derive(Debug, Clone)]
pub struct Sample<P> {
    pts: Timestamp,
    payload: P,
}

impl<P> Sample<P> {
    /// Create a sample with the given presentation timestamp
    pub fn new(pts: Timestamp, payload: P) -> Self {
        Self { pts, payload }
    }

    /// Presentation timestamp
    pub fn pts(&self) -> Timestamp {
        self.pts
    }

    /// Borrow the payload
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Consume the sample, yielding the payload
    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// A decoded audio frame (interleaved PCM)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub data: Bytes,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFrame {
    /// Playback duration of this frame, derived from PCM geometry (16-bit samples)
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.data.len() as u64 / (2 * self.channels as u64);
        Duration::from_micros(frames * 1_000_000 / self.sample_rate as u64)
    }
}

/// Plane of a decoded volumetric video bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Occupancy,
    Geometry,
    Texture,
    Transparency,
}

impl PlaneKind {
    pub const COUNT: usize = 4;

    /// Slot index inside a [`VideoBundle`]
    pub fn index(self) -> usize {
        match self {
            PlaneKind::Occupancy => 0,
            PlaneKind::Geometry => 1,
            PlaneKind::Texture => 2,
            PlaneKind::Transparency => 3,
        }
    }
}

impl std::fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaneKind::Occupancy => write!(f, "Occupancy"),
            PlaneKind::Geometry => write!(f, "Geometry"),
            PlaneKind::Texture => write!(f, "Texture"),
            PlaneKind::Transparency => write!(f, "Transparency"),
        }
    }
}

/// One decoded plane sub-packet of a video bundle
#[derive(Debug, Clone)]
pub struct PlanePacket {
    pub kind: PlaneKind,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp shared by every plane of the bundle
    pub pts: Timestamp,
}

/// A decoded volumetric video bundle
///
/// Fixed-size array of per-plane sub-packets (occupancy, geometry, texture,
/// transparency) sharing one presentation timestamp. Not every stream carries
/// all planes; absent planes stay `None`. The texture plane is the anchor the
/// video scheduler times releases against.
#[derive(Debug, Clone, Default)]
pub struct VideoBundle {
    planes: [Option<PlanePacket>; PlaneKind::COUNT],
}

impl VideoBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plane, replacing any previous packet of the same kind
    pub fn set_plane(&mut self, packet: PlanePacket) {
        let idx = packet.kind.index();
        self.planes[idx] = Some(packet);
    }

    /// Get a plane by kind
    pub fn plane(&self, kind: PlaneKind) -> Option<&PlanePacket> {
        self.planes[kind.index()].as_ref()
    }

    /// The texture plane, if present
    pub fn texture(&self) -> Option<&PlanePacket> {
        self.plane(PlaneKind::Texture)
    }

    /// Presentation timestamp of the texture-bearing sub-stream
    ///
    /// Release timing anchors on the texture plane, not an aggregate.
    pub fn anchor_pts(&self) -> Option<Timestamp> {
        self.texture().map(|p| p.pts)
    }

    /// Number of planes present
    pub fn plane_count(&self) -> usize {
        self.planes.iter().filter(|p| p.is_some()).count()
    }

    /// Total payload bytes across all planes
    pub fn size(&self) -> usize {
        self.planes
            .iter()
            .flatten()
            .map(|p| p.data.len())
            .sum()
    }
}

/// A decoded haptic event
///
/// Haptic decoders may emit several keyframes of one effect out of temporal
/// order; events are re-sorted by start timestamp before release.
#[derive(Debug, Clone)]
pub struct HapticEvent {
    /// When actuation starts
    pub start: Timestamp,
    /// When actuation ends
    pub end: Timestamp,
    /// Minimum intensity over the event
    pub intensity_min: f32,
    /// Maximum intensity over the event
    pub intensity_max: f32,
    /// Encoded actuation payload
    pub data: Bytes,
}

impl HapticEvent {
    /// Actuation duration
    pub fn duration(&self) -> Duration {
        self.end.diff(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Timestamp::from_micros(1_500_000);
        assert_eq!(ts.as_secs_f64(), 1.5);
        assert_eq!(ts.add(Duration::from_millis(500)).micros, 2_000_000);
        assert_eq!(ts.sub(Duration::from_secs(1)).micros, 500_000);

        let other = Timestamp::from_secs_f64(2.0);
        assert_eq!(ts.delta_micros(other), -500_000);
        assert_eq!(ts.diff(other), Duration::from_millis(500));
    }

    #[test]
    fn test_timestamp_ordering() {
        let a = Timestamp::from_micros(100);
        let b = Timestamp::from_micros(200);
        assert!(a < b);
        assert_eq!(a, Timestamp::from_micros(100));
    }

    #[test]
    fn test_sample_immutable_pts() {
        let sample = Sample::new(Timestamp::from_micros(42), "payload");
        assert_eq!(sample.pts().micros, 42);
        assert_eq!(*sample.payload(), "payload");
        assert_eq!(sample.into_payload(), "payload");
    }

    #[test]
    fn test_video_bundle_anchor() {
        let mut bundle = VideoBundle::new();
        assert!(bundle.anchor_pts().is_none());

        let pts = Timestamp::from_micros(40_000);
        for kind in [PlaneKind::Occupancy, PlaneKind::Geometry, PlaneKind::Texture] {
            bundle.set_plane(PlanePacket {
                kind,
                data: Bytes::from_static(&[0u8; 16]),
                width: 4,
                height: 4,
                pts,
            });
        }

        assert_eq!(bundle.plane_count(), 3);
        assert_eq!(bundle.anchor_pts(), Some(pts));
        assert_eq!(bundle.size(), 48);
        assert!(bundle.plane(PlaneKind::Transparency).is_none());
    }

    #[test]
    fn test_set_plane_replaces_same_kind() {
        let mut bundle = VideoBundle::new();
        for pts_us in [40_000i64, 80_000] {
            bundle.set_plane(PlanePacket {
                kind: PlaneKind::Texture,
                data: Bytes::from_static(&[0u8; 8]),
                width: 2,
                height: 2,
                pts: Timestamp::from_micros(pts_us),
            });
        }

        assert_eq!(bundle.plane_count(), 1);
        assert_eq!(bundle.anchor_pts(), Some(Timestamp::from_micros(80_000)));
    }

    #[test]
    fn test_audio_frame_duration() {
        // 48kHz stereo s16le, 960 frames = 20ms
        let frame = AudioFrame {
            data: Bytes::from(vec![0u8; 960 * 2 * 2]),
            sample_rate: 48_000,
            channels: 2,
        };
        assert_eq!(frame.duration(), Duration::from_millis(20));
    }
}
