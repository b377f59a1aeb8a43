//! Completion signalling between the output sink and the playback loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Auto-reset waitable event.
///
/// The sink raises the signal when it finishes consuming a submitted buffer;
/// the playback loop waits on it and relays each observed signal into
/// [`update`](crate::PlaybackEngine::update). Observing the signalled state
/// through [`wait`](Self::wait) resets it. Clones share the underlying event.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    inner: Arc<SignalState>,
}

#[derive(Debug, Default)]
struct SignalState {
    signalled: Mutex<bool>,
    condvar: Condvar,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal, waking one waiter.
    pub fn notify(&self) {
        let mut signalled = self.inner.signalled.lock();
        *signalled = true;
        self.inner.condvar.notify_one();
    }

    /// Block until the signal is raised or `timeout` elapses.
    ///
    /// Returns true iff the signal was observed; observing it resets the
    /// signal, so one `notify` satisfies one `wait`.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signalled = self.inner.signalled.lock();
        while !*signalled {
            if self
                .inner
                .condvar
                .wait_until(&mut signalled, deadline)
                .timed_out()
            {
                break;
            }
        }
        std::mem::take(&mut *signalled)
    }

    /// Clear the signal without waiting.
    pub fn reset(&self) {
        *self.inner.signalled.lock() = false;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use super::*;
    use std::thread;

    #[test]
    fn test_notify_then_wait() {
        let signal = CompletionSignal::new();
        signal.notify();
        assert!(signal.wait(Duration::ZERO));
        // Auto-reset: the second wait sees nothing.
        assert!(!signal.wait(Duration::ZERO));
    }

    #[test]
    fn test_wait_times_out() {
        let signal = CompletionSignal::new();
        assert!(!signal.wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_reset_clears_pending_signal() {
        let signal = CompletionSignal::new();
        signal.notify();
        signal.reset();
        assert!(!signal.wait(Duration::ZERO));
    }

    #[test]
    fn test_repeated_notify_coalesces() {
        let signal = CompletionSignal::new();
        signal.notify();
        signal.notify();
        assert!(signal.wait(Duration::ZERO));
        assert!(!signal.wait(Duration::ZERO));
    }

    #[test]
    fn test_cross_thread_notify() {
        let signal = CompletionSignal::new();
        let notifier = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            notifier.notify();
        });
        assert!(signal.wait(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
