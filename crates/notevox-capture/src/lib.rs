pub mod buffer;
pub mod cpal_source;
pub mod events;
pub mod level;
pub mod poll;
pub mod resampler;
pub mod session;
pub mod source;

// Public API
pub use buffer::{ChunkBuffer, EncodedChunk};
pub use cpal_source::CpalAudioSource;
pub use events::{CaptureEvent, PipelineStats};
pub use level::{LevelAnalyzer, LevelSample};
pub use resampler::LinearResampler;
pub use session::CaptureSession;
pub use source::{AudioSource, FrameSink};
