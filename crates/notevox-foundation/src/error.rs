use thiserror::Error;

/// Capture session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Paused,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    /// The hardware stream could not be opened (no device, permission
    /// denied, device busy). Not retried automatically; any partially
    /// acquired resources are released before this surfaces.
    #[error("failed to acquire audio input: {0}")]
    Acquisition(String),

    /// Operation invoked from a state that forbids it. No state mutation
    /// has occurred.
    #[error("operation not allowed while {actual:?} (requires {expected})")]
    InvalidState {
        actual: CaptureState,
        expected: &'static str,
    },

    /// `stop()` called with no active session.
    #[error("no active capture session")]
    NotActive,

    #[error("invalid capture configuration: {0}")]
    Config(String),
}
