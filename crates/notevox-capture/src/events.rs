use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Events delivered to the consuming UI layer over the capture channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// One encoded PCM chunk, emitted once per resampled hardware frame.
    Chunk(Vec<u8>),
    /// Current level in dBFS, emitted on every level poll. Negative
    /// infinity means a zero-RMS window.
    Level(f32),
    /// The signal stayed under the silence threshold for a full timeout
    /// period. Re-arms and can fire again after another full period.
    SilenceDetected,
    /// Signal above silence but under the low-level threshold. Fires on
    /// every poll while in the band; intentionally not debounced.
    LowLevel,
    /// Signal at or above the clipping threshold. Fires on every poll
    /// while the condition holds.
    Clipping,
}

/// Counters shared across the session, frame callback, and poll thread.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub frames_processed: AtomicU64,
    pub chunks_emitted: AtomicU64,
    pub chunks_evicted: AtomicU64,
    pub events_dropped: AtomicU64,
}

/// Non-blocking producer end of the bounded event channel.
///
/// The audio callback must never stall on a slow consumer, so a full
/// channel drops the event and counts it instead of blocking.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<CaptureEvent>,
    stats: Arc<PipelineStats>,
}

impl EventSink {
    pub fn new(capacity: usize, stats: Arc<PipelineStats>) -> (Self, Receiver<CaptureEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx, stats }, rx)
    }

    pub fn emit(&self, event: CaptureEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("event channel full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!("no event listener attached");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_delivers_in_order() {
        let stats = Arc::new(PipelineStats::default());
        let (sink, rx) = EventSink::new(8, stats);
        sink.emit(CaptureEvent::Level(-12.5));
        sink.emit(CaptureEvent::Clipping);
        assert_eq!(rx.recv().unwrap(), CaptureEvent::Level(-12.5));
        assert_eq!(rx.recv().unwrap(), CaptureEvent::Clipping);
    }

    #[test]
    fn full_channel_drops_and_counts() {
        let stats = Arc::new(PipelineStats::default());
        let (sink, rx) = EventSink::new(2, Arc::clone(&stats));
        for _ in 0..5 {
            sink.emit(CaptureEvent::LowLevel);
        }
        assert_eq!(stats.events_dropped.load(Ordering::Relaxed), 3);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn disconnected_receiver_does_not_count_as_drop() {
        let stats = Arc::new(PipelineStats::default());
        let (sink, rx) = EventSink::new(2, Arc::clone(&stats));
        drop(rx);
        sink.emit(CaptureEvent::SilenceDetected);
        assert_eq!(stats.events_dropped.load(Ordering::Relaxed), 0);
    }
}
