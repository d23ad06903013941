//! Scheduling and synchronization core for volumetric playback
//!
//! Keeps audio, video and haptic tracks aligned against one shared clock
//! even though each medium is decoded by an independently-paced producer:
//! - Each decoder pushes time-stamped samples into a bounded SPSC ring
//! - A per-track scheduler service drains its ring on a periodic tick and
//!   releases samples whose timestamps fall inside the track's tolerance
//!   window relative to the master clock
//! - Samples arriving already late pull the shared clock backward instead
//!   of being dropped, so a slow decoder re-aligns all three tracks
//! - Haptic events pass through an ordered buffer since their decoder may
//!   emit out of temporal order

pub mod audio;
pub mod buffer;
pub mod clock;
pub mod haptic;
pub mod health;
pub mod ring;
pub mod service;
pub mod types;
pub mod video;

pub use audio::AudioScheduler;
pub use buffer::OrderedBuffer;
pub use clock::MasterClock;
pub use haptic::HapticScheduler;
pub use health::{HealthSummary, SyncHealth};
pub use service::{SchedulerService, ServiceState, run_service};
pub use types::{AudioFrame, HapticEvent, PlaneKind, PlanePacket, Sample, Timestamp, VideoBundle};
pub use video::VideoScheduler;
