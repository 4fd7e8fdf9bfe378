use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Sample rate required by the downstream speech pipeline (Hz).
pub const DEFAULT_TARGET_SAMPLE_RATE: u32 = 16_000;

/// Expected cadence of hardware frame delivery (ms).
pub const DEFAULT_CHUNK_INTERVAL_MS: u32 = 100;

/// Upper bound on buffered encoded audio (100 MiB).
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 100 * 1024 * 1024;

/// Capture pipeline configuration, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Output sample rate of the resampler (Hz).
    pub target_sample_rate: u32,
    /// Nominal interval between hardware frames (ms). Used to size the
    /// encoded-chunk scratch capacity, not to drive a timer.
    pub chunk_interval_ms: u32,
    /// Eviction starts once buffered bytes reach 90% of this and drains
    /// back down to 50%.
    pub max_buffer_bytes: usize,
    /// Readings below this are treated as silence (dBFS).
    pub silence_threshold_db: f32,
    /// How long a silence run must last before it is reported (ms).
    pub silence_timeout_ms: u32,
    /// Readings between the silence threshold and this are reported as
    /// low level on every poll (dBFS).
    pub low_level_threshold_db: f32,
    /// Readings at or above this are reported as clipping (dBFS).
    pub clipping_threshold_db: f32,
    /// Interval of the level-poll timer (ms).
    pub level_poll_interval_ms: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: DEFAULT_TARGET_SAMPLE_RATE,
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            silence_threshold_db: -50.0,
            silence_timeout_ms: 3_000,
            low_level_threshold_db: -40.0,
            clipping_threshold_db: 0.0,
            level_poll_interval_ms: 100,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.target_sample_rate == 0 {
            return Err(CaptureError::Config(
                "target_sample_rate must be non-zero".into(),
            ));
        }
        if self.max_buffer_bytes == 0 {
            return Err(CaptureError::Config(
                "max_buffer_bytes must be non-zero".into(),
            ));
        }
        if self.silence_timeout_ms == 0 {
            return Err(CaptureError::Config(
                "silence_timeout_ms must be non-zero".into(),
            ));
        }
        if self.level_poll_interval_ms == 0 {
            return Err(CaptureError::Config(
                "level_poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.low_level_threshold_db <= self.silence_threshold_db {
            return Err(CaptureError::Config(format!(
                "low_level_threshold_db ({}) must be above silence_threshold_db ({})",
                self.low_level_threshold_db, self.silence_threshold_db
            )));
        }
        Ok(())
    }
}
