//! Session configuration
//!
//! Read once at configure-time, before a playback session starts. The JSON
//! keys accept both the snake_case names and the PascalCase names used by
//! existing player configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Playback session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Force all decoders onto the shared master clock; when false each
    /// track runs on its own unsynced clock
    #[serde(alias = "ForceDecodersSynchro")]
    pub force_decoders_synchro: bool,

    /// Audio and haptic tolerance window, milliseconds
    #[serde(alias = "Latency")]
    pub latency_ms: u64,

    /// Video tolerance window, milliseconds
    #[serde(alias = "Jitter")]
    pub jitter_ms: u64,

    /// Audio input queue capacity (samples)
    #[serde(alias = "AudioQueue")]
    pub audio_queue: usize,

    /// Video input queue capacity (bundles)
    #[serde(alias = "VideoQueue")]
    pub video_queue: usize,

    /// Haptic input queue capacity (events)
    #[serde(alias = "HapticQueue")]
    pub haptic_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            force_decoders_synchro: true,
            latency_ms: 100,
            jitter_ms: 5,
            audio_queue: 64,
            video_queue: 16,
            haptic_queue: 128,
        }
    }
}

impl SessionConfig {
    /// Audio/haptic tolerance window
    ///
    /// Zero is legal and means "deliver as soon as not in the future".
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Video tolerance window (same role as latency; the name is kept for
    /// compatibility with existing configuration files)
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    /// Load a configuration from a JSON file; missing keys use defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration from a JSON string
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse session configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.force_decoders_synchro);
        assert_eq!(config.latency(), Duration::from_millis(100));
        assert_eq!(config.jitter(), Duration::from_millis(5));
        assert_eq!(config.video_queue, 16);
    }

    #[test]
    fn test_parse_pascal_case_keys() {
        let config = SessionConfig::from_json_str(
            r#"{"ForceDecodersSynchro": false, "Latency": 30, "Jitter": 2}"#,
        )
        .unwrap();
        assert!(!config.force_decoders_synchro);
        assert_eq!(config.latency_ms, 30);
        assert_eq!(config.jitter_ms, 2);
        // Unspecified keys fall back to defaults.
        assert_eq!(config.audio_queue, 64);
    }

    #[test]
    fn test_parse_snake_case_keys() {
        let config =
            SessionConfig::from_json_str(r#"{"latency_ms": 50, "haptic_queue": 32}"#).unwrap();
        assert_eq!(config.latency_ms, 50);
        assert_eq!(config.haptic_queue, 32);
    }

    #[test]
    fn test_zero_tolerances_are_legal() {
        let config = SessionConfig::from_json_str(r#"{"Latency": 0, "Jitter": 0}"#).unwrap();
        assert_eq!(config.latency(), Duration::ZERO);
        assert_eq!(config.jitter(), Duration::ZERO);
    }
}
