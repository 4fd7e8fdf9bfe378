use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Periodic timer thread driving the level analyzer.
///
/// Started and stopped strictly in lockstep with the Recording state. The
/// tick waits on a channel with a timeout so `stop` wakes the thread
/// immediately and joins it before returning: no tick runs after `stop`.
pub struct PollTimer {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl PollTimer {
    pub fn start<F>(interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("level-poll".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    // Stop signal or sender gone: either way, we are done.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self { stop_tx, handle })
    }

    /// Signal the thread and join it synchronously.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            tracing::error!("level poll thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn ticks_repeatedly_until_stopped() {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let timer = PollTimer::start(Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(100));
        timer.stop();
        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 3, "expected several ticks, got {}", ticks);
    }

    #[test]
    fn no_ticks_after_stop() {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let timer = PollTimer::start(Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        timer.stop();
        let at_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), at_stop);
    }

    #[test]
    fn stop_returns_promptly_with_long_interval() {
        let timer = PollTimer::start(Duration::from_secs(60), || {}).unwrap();
        let start = std::time::Instant::now();
        timer.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
