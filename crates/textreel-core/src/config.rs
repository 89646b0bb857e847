//! Pipeline tuning parameters.
//!
//! Every field has a default matching the behaviour the pipeline was tuned
//! with; a partial JSON document only overrides what it names.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::FrameKind;

/// Lowest selectable base octave for the musical spectrum.
pub const MIN_SPECTRUM_OCTAVE: u32 = 1;
/// Highest selectable base octave for the musical spectrum.
pub const MAX_SPECTRUM_OCTAVE: u32 = 6;

/// Top-level configuration for a playback session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output sample rate in Hz, fixed for the session.
    pub sample_rate: u32,
    pub capacities: QueueCapacities,
    pub sync: SyncConfig,
    pub seek: SeekConfig,
    pub viz: VizConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            capacities: QueueCapacities::default(),
            sync: SyncConfig::default(),
            seek: SeekConfig::default(),
            viz: VizConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse an inline JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be non-zero".into()));
        }
        for kind in FrameKind::ALL {
            if self.capacities.get(kind) == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{kind} queue capacity must be non-zero"
                )));
            }
        }
        if !(MIN_SPECTRUM_OCTAVE..=MAX_SPECTRUM_OCTAVE).contains(&self.viz.spectrum_base_octave) {
            return Err(Error::InvalidConfig(format!(
                "spectrum_base_octave must be in {MIN_SPECTRUM_OCTAVE}..={MAX_SPECTRUM_OCTAVE}"
            )));
        }
        if self.viz.scroll_interval == 0 {
            return Err(Error::InvalidConfig("scroll_interval must be non-zero".into()));
        }
        if self.sync.drop_lag_frames == 0 {
            return Err(Error::InvalidConfig("drop_lag_frames must be non-zero".into()));
        }
        Ok(())
    }
}

/// Maximum frame count per queue kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueCapacities {
    pub audio: usize,
    pub video: usize,
    pub void: usize,
    pub wave_sample: usize,
}

impl Default for QueueCapacities {
    fn default() -> Self {
        Self {
            audio: 32,
            video: 8,
            void: 8,
            wave_sample: 8,
        }
    }
}

impl QueueCapacities {
    pub const fn get(&self, kind: FrameKind) -> usize {
        match kind {
            FrameKind::Audio => self.audio,
            FrameKind::Video => self.video,
            FrameKind::Void => self.void,
            FrameKind::WaveSample => self.wave_sample,
        }
    }
}

/// Pacing and drift parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Audio drift beyond which the clock is resynchronized.
    pub drift_threshold_us: i64,
    /// Ceiling for a single pacing sleep.
    pub max_sleep_us: i64,
    /// Wake this much before a frame is due.
    pub sleep_lead_us: i64,
    /// Drop frames once video lags by more than this many frame durations.
    pub drop_lag_frames: u32,
    /// Streams slower than this are never frame-dropped.
    pub min_drop_fps: u32,
    /// Redraw cadence when no video frame is queued.
    pub refresh_interval_us: i64,
    /// Audio frames left below which a finished item counts as drained.
    pub drain_low_watermark: usize,
    /// Main loop tick while paused.
    pub paused_tick_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_threshold_us: 40_000,
            max_sleep_us: 100_000,
            sleep_lead_us: 10_000,
            drop_lag_frames: 3,
            min_drop_fps: 12,
            refresh_interval_us: 40_000,
            drain_low_watermark: 16,
            paused_tick_ms: 40,
        }
    }
}

/// Producer behaviour right after a seek.
///
/// The counts are empirical: some decoders emit noisy blocks immediately
/// after repositioning, lossless ones for longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekConfig {
    pub ignore_audio_blocks: u32,
    pub ignore_audio_blocks_lossless: u32,
    pub ignore_video_frames: u32,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            ignore_audio_blocks: 4,
            ignore_audio_blocks_lossless: 24,
            ignore_video_frames: 8,
        }
    }
}

/// Visualization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    /// Blocks accumulated per scroll column.
    pub scroll_interval: u32,
    pub spectrum_base_octave: u32,
    pub poll_interval_ms: u64,
    /// Horizontal stretch of circles to compensate for tall cells.
    pub circle_aspect: i32,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            scroll_interval: 5,
            spectrum_base_octave: 3,
            poll_interval_ms: 10,
            circle_aspect: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.capacities.get(FrameKind::Audio), 32);
        assert_eq!(config.capacities.get(FrameKind::Video), 8);
        assert_eq!(config.sync.drift_threshold_us, 40_000);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config =
            PipelineConfig::from_json_str(r#"{"sample_rate": 48000, "capacities": {"video": 4}}"#)
                .unwrap();
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.capacities.video, 4);
        assert_eq!(config.capacities.audio, 32);
        assert_eq!(config.seek, SeekConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"capacities": {"audio": 0}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = PipelineConfig::from_json_str(r#"{"viz": {"spectrum_base_octave": 9}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = PipelineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
