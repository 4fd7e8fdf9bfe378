use notevox_foundation::CaptureError;

/// Callback invoked once per hardware buffer with mono samples at the
/// native rate, normalized to [-1.0, 1.0]. The slice is only valid for the
/// duration of the call.
pub type FrameSink = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Capability interface over a hardware audio input.
///
/// Implementations own the platform stream handle; the capture session
/// interacts with it only through these methods and the frame sink handed
/// to `open`. This keeps the hardware handle out of shared mutable state.
pub trait AudioSource {
    /// Acquire the hardware stream and begin delivering frames to `sink`.
    /// Returns the native sample rate of the opened stream. Failure must
    /// leave no partially acquired resources behind.
    fn open(&mut self, sink: FrameSink) -> Result<u32, CaptureError>;

    /// Quiesce frame delivery without releasing the stream, so `resume`
    /// does not have to reacquire hardware.
    fn pause(&mut self);

    /// Restart delivery on a stream previously quiesced by `pause`.
    fn resume(&mut self);

    /// Release the stream. Must be idempotent: closing an already-closed
    /// source is a no-op.
    fn close(&mut self);
}
