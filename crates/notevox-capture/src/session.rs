use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use notevox_foundation::{real_clock, CaptureConfig, CaptureError, CaptureState, SharedClock};

use crate::buffer::{ChunkBuffer, EncodedChunk};
use crate::events::{CaptureEvent, EventSink, PipelineStats};
use crate::level::LevelAnalyzer;
use crate::poll::PollTimer;
use crate::resampler::LinearResampler;
use crate::source::{AudioSource, FrameSink};

/// Most recent native-rate samples kept for level analysis (~46ms at
/// 44.1kHz).
const ANALYSIS_WINDOW_SAMPLES: usize = 2048;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Pipeline state shared between the session, the hardware frame callback,
/// and the level-poll thread. One lock; frame callbacks are strictly
/// ordered by it, level polls interleave freely.
struct PipelineShared {
    resampler: Option<LinearResampler>,
    buffer: ChunkBuffer,
    analyzer: LevelAnalyzer,
    window: VecDeque<f32>,
}

impl PipelineShared {
    fn push_window(&mut self, samples: &[f32]) {
        let take = samples.len().min(ANALYSIS_WINDOW_SAMPLES);
        let start = samples.len() - take;
        while self.window.len() + take > ANALYSIS_WINDOW_SAMPLES {
            self.window.pop_front();
        }
        self.window.extend(&samples[start..]);
    }
}

/// Owns the capture lifecycle: Idle -> Recording <-> Paused -> Idle.
///
/// Every resource (stream handle, poll timer, analysis window) is acquired
/// in `start` and released on every exit path exactly once; cleanup is
/// idempotent so the error path of `start` and a later `stop` cannot
/// double-release.
pub struct CaptureSession {
    config: CaptureConfig,
    source: Box<dyn AudioSource>,
    clock: SharedClock,
    shared: Arc<Mutex<PipelineShared>>,
    events: EventSink,
    stats: Arc<PipelineStats>,
    poll_timer: Option<PollTimer>,
    state: CaptureState,
    start_time: Option<Instant>,
    pause_start: Option<Instant>,
    total_paused: Duration,
}

impl CaptureSession {
    /// Build a session around an injected source. Returns the receiving
    /// end of the bounded event channel alongside the session.
    pub fn new(
        config: CaptureConfig,
        source: Box<dyn AudioSource>,
    ) -> Result<(Self, Receiver<CaptureEvent>), CaptureError> {
        Self::with_clock(config, source, real_clock())
    }

    pub fn with_clock(
        config: CaptureConfig,
        source: Box<dyn AudioSource>,
        clock: SharedClock,
    ) -> Result<(Self, Receiver<CaptureEvent>), CaptureError> {
        config.validate()?;
        let stats = Arc::new(PipelineStats::default());
        let (events, event_rx) = EventSink::new(EVENT_CHANNEL_CAPACITY, Arc::clone(&stats));
        let shared = Arc::new(Mutex::new(PipelineShared {
            resampler: None,
            buffer: ChunkBuffer::new(config.max_buffer_bytes),
            analyzer: LevelAnalyzer::new(&config),
            window: VecDeque::with_capacity(ANALYSIS_WINDOW_SAMPLES),
        }));
        Ok((
            Self {
                config,
                source,
                clock,
                shared,
                events,
                stats,
                poll_timer: None,
                state: CaptureState::Idle,
                start_time: None,
                pause_start: None,
                total_paused: Duration::ZERO,
            },
            event_rx,
        ))
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Acquire the hardware stream and begin recording. Legal only from
    /// Idle. On any failure the session is left Idle with zero residual
    /// resources.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::InvalidState {
                actual: self.state,
                expected: "Idle",
            });
        }

        let sink = self.make_frame_sink();
        let native_rate = match self.source.open(sink) {
            Ok(rate) => rate,
            Err(e) => {
                self.release_resources();
                return Err(e);
            }
        };

        {
            let mut inner = self.shared.lock();
            inner.resampler = Some(LinearResampler::new(
                native_rate,
                self.config.target_sample_rate,
            ));
            inner.buffer.clear();
            inner.analyzer.reset();
            inner.window.clear();
        }

        self.start_time = Some(self.clock.now());
        self.pause_start = None;
        self.total_paused = Duration::ZERO;

        if let Err(e) = self.start_poll_timer() {
            self.release_resources();
            return Err(e);
        }

        self.transition(CaptureState::Recording);
        tracing::info!(native_rate, target_rate = self.config.target_sample_rate, "capture started");
        Ok(())
    }

    /// Suspend capture without releasing hardware. Legal only from
    /// Recording. The poll timer is stopped synchronously: no level poll
    /// fires after this returns.
    pub fn pause(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Recording {
            return Err(CaptureError::InvalidState {
                actual: self.state,
                expected: "Recording",
            });
        }
        self.stop_poll_timer();
        self.source.pause();
        self.pause_start = Some(self.clock.now());
        self.transition(CaptureState::Paused);
        Ok(())
    }

    /// Resume a paused session. Legal only from Paused.
    pub fn resume(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Paused {
            return Err(CaptureError::InvalidState {
                actual: self.state,
                expected: "Paused",
            });
        }
        let now = self.clock.now();
        if let Some(pause_start) = self.pause_start.take() {
            self.total_paused += now.duration_since(pause_start);
        }
        // The pause gap must not count toward a silence timeout.
        self.shared.lock().analyzer.reset_silence_run();
        self.source.resume();
        if let Err(e) = self.start_poll_timer() {
            // Could not restart polling; quiesce again and stay Paused.
            self.source.pause();
            self.pause_start = Some(self.clock.now());
            return Err(e);
        }
        self.transition(CaptureState::Recording);
        Ok(())
    }

    /// Finalize the session: close the stream, release everything, and
    /// return the buffered recording as one contiguous byte sequence.
    pub fn stop(&mut self) -> Result<Vec<u8>, CaptureError> {
        match self.state {
            CaptureState::Recording | CaptureState::Paused => {}
            CaptureState::Idle => return Err(CaptureError::NotActive),
        }
        self.stop_poll_timer();
        self.source.close();
        let recording = self.shared.lock().buffer.drain();
        self.release_resources();
        self.transition(CaptureState::Idle);
        tracing::info!(bytes = recording.len(), "capture stopped");
        Ok(recording)
    }

    /// Wall-clock time spent recording, excluding completed pauses and any
    /// pause currently in progress. Zero when Idle.
    pub fn elapsed(&self) -> Duration {
        let Some(start) = self.start_time else {
            return Duration::ZERO;
        };
        let now = self.clock.now();
        let mut elapsed = now.duration_since(start).saturating_sub(self.total_paused);
        if let Some(pause_start) = self.pause_start {
            elapsed = elapsed.saturating_sub(now.duration_since(pause_start));
        }
        elapsed
    }

    /// Most recent level reading in dBFS; negative infinity before the
    /// first poll or when Idle.
    pub fn current_level_db(&self) -> f32 {
        self.shared.lock().analyzer.last_db()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.shared.lock().buffer.total_bytes()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    fn transition(&mut self, new_state: CaptureState) {
        tracing::info!("capture state: {:?} -> {:?}", self.state, new_state);
        self.state = new_state;
    }

    fn make_frame_sink(&self) -> FrameSink {
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        let stats = Arc::clone(&self.stats);
        Box::new(move |frame: &[f32]| {
            let mut inner = shared.lock();
            inner.push_window(frame);
            let bytes = match inner.resampler.as_mut() {
                Some(resampler) => resampler.process(frame),
                None => return,
            };
            if bytes.is_empty() {
                return;
            }
            stats.frames_processed.fetch_add(1, Ordering::Relaxed);
            events.emit(CaptureEvent::Chunk(bytes.clone()));
            stats.chunks_emitted.fetch_add(1, Ordering::Relaxed);
            let evicted = inner.buffer.push(EncodedChunk::new(bytes));
            if evicted > 0 {
                stats.chunks_evicted.fetch_add(evicted, Ordering::Relaxed);
            }
        })
    }

    fn start_poll_timer(&mut self) -> Result<(), CaptureError> {
        let interval = Duration::from_millis(self.config.level_poll_interval_ms as u64);
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        let clock = Arc::clone(&self.clock);
        let timer = PollTimer::start(interval, move || {
            let outcome = {
                let mut guard = shared.lock();
                let inner = &mut *guard;
                let samples = inner.window.make_contiguous();
                inner.analyzer.poll(samples, clock.now())
            };
            events.emit(CaptureEvent::Level(outcome.db));
            if outcome.clipping {
                events.emit(CaptureEvent::Clipping);
            }
            if outcome.low_level {
                events.emit(CaptureEvent::LowLevel);
            }
            if outcome.silence {
                tracing::debug!("silence timeout reached");
                events.emit(CaptureEvent::SilenceDetected);
            }
        })
        .map_err(|e| {
            CaptureError::Acquisition(format!("failed to spawn level poll thread: {}", e))
        })?;
        self.poll_timer = Some(timer);
        Ok(())
    }

    fn stop_poll_timer(&mut self) {
        if let Some(timer) = self.poll_timer.take() {
            timer.stop();
        }
    }

    /// Release everything a session can hold. Safe to call more than once;
    /// every exit path from an active session funnels through here.
    fn release_resources(&mut self) {
        self.stop_poll_timer();
        self.source.close();
        let mut inner = self.shared.lock();
        inner.resampler = None;
        inner.buffer.clear();
        inner.analyzer.reset();
        inner.window.clear();
        drop(inner);
        self.start_time = None;
        self.pause_start = None;
        self.total_paused = Duration::ZERO;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.state != CaptureState::Idle {
            tracing::warn!("capture session dropped while {:?}", self.state);
            self.release_resources();
        }
    }
}
