use std::time::{Duration, Instant};

use notevox_foundation::CaptureConfig;

/// Loudness reading from one poll of the analysis window.
#[derive(Debug, Clone, Copy)]
pub struct LevelSample {
    pub rms: f32,
    /// dBFS relative to full scale 1.0; negative infinity when rms is 0.
    pub db: f32,
}

/// Detector flags raised by one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollOutcome {
    pub db: f32,
    pub silence: bool,
    pub low_level: bool,
    pub clipping: bool,
}

/// Short-window loudness analysis and silence/low-level/clipping detection.
///
/// The silence detector is debounced and re-arming: a run must last the
/// configured timeout before it fires, and firing restarts the run clock so
/// sustained silence reports once per timeout period. The low-level and
/// clipping detectors fire on every poll while their condition holds; the
/// low-level asymmetry is intentional (the UI wants a steady indicator,
/// not an edge).
pub struct LevelAnalyzer {
    silence_threshold_db: f32,
    silence_timeout: Duration,
    low_level_threshold_db: f32,
    clipping_threshold_db: f32,
    silence_start: Option<Instant>,
    last_db: f32,
}

impl LevelAnalyzer {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            silence_threshold_db: config.silence_threshold_db,
            silence_timeout: Duration::from_millis(config.silence_timeout_ms as u64),
            low_level_threshold_db: config.low_level_threshold_db,
            clipping_threshold_db: config.clipping_threshold_db,
            silence_start: None,
            last_db: f32::NEG_INFINITY,
        }
    }

    /// RMS over the window (samples already normalized to [-1, 1]) and its
    /// dBFS value. Zero RMS maps to negative infinity, which consumers
    /// must treat as a sentinel, not an error.
    pub fn compute_level(samples: &[f32]) -> LevelSample {
        if samples.is_empty() {
            return LevelSample {
                rms: 0.0,
                db: f32::NEG_INFINITY,
            };
        }
        let sum_squares: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
        let rms = (sum_squares / samples.len() as f64).sqrt() as f32;
        let db = if rms <= 0.0 {
            f32::NEG_INFINITY
        } else {
            20.0 * rms.log10()
        };
        LevelSample { rms, db }
    }

    /// Run one poll over the current window contents.
    pub fn poll(&mut self, samples: &[f32], now: Instant) -> PollOutcome {
        let level = Self::compute_level(samples);
        self.last_db = level.db;

        let mut outcome = PollOutcome {
            db: level.db,
            ..Default::default()
        };

        if level.db < self.silence_threshold_db {
            match self.silence_start {
                None => self.silence_start = Some(now),
                Some(start) => {
                    if now.duration_since(start) >= self.silence_timeout {
                        outcome.silence = true;
                        // Re-arm rather than fire once per run.
                        self.silence_start = Some(now);
                    }
                }
            }
        } else {
            self.silence_start = None;
            if level.db < self.low_level_threshold_db {
                outcome.low_level = true;
            }
        }

        if level.db >= self.clipping_threshold_db {
            outcome.clipping = true;
        }

        outcome
    }

    /// Last dB reading, negative infinity before the first poll.
    pub fn last_db(&self) -> f32 {
        self.last_db
    }

    /// Clear an in-progress silence run (used across pause/resume so the
    /// pause gap is not counted as silence).
    pub fn reset_silence_run(&mut self) {
        self.silence_start = None;
    }

    pub fn reset(&mut self) {
        self.silence_start = None;
        self.last_db = f32::NEG_INFINITY;
    }
}
