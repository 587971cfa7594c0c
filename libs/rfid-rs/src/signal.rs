//! One-shot edge notification between an interrupt watcher and [wait_for_card].
//!
//! The channel holds at most one pending edge; further edges are dropped until
//! the waiter consumed it.
//!
//! [wait_for_card]: crate::Rc522::wait_for_card

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use crate::EdgeWatch;

/// Create a connected notifier and signal pair.
pub fn edge_signal() -> (EdgeNotifier, EdgeSignal) {
    let (tx, rx) = mpsc::sync_channel(1);
    (EdgeNotifier { tx }, EdgeSignal { rx })
}

/// Producer side, owned by whatever observes the line
#[derive(Clone)]
pub struct EdgeNotifier {
    tx: SyncSender<()>,
}

impl EdgeNotifier {
    /// Report an edge without blocking.
    ///
    /// Returns `false` once the [EdgeSignal] is gone.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Waiter side
pub struct EdgeSignal {
    rx: Receiver<()>,
}

impl EdgeSignal {
    /// Drop an edge reported before the caller started waiting.
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl EdgeWatch for EdgeSignal {
    type Error = SignalClosed;

    fn wait(&mut self, timeout: Duration) -> Result<bool, SignalClosed> {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(SignalClosed),
        }
    }
}

/// Every [EdgeNotifier] was dropped, no edge can arrive anymore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalClosed;

impl fmt::Display for SignalClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge notifier closed")
    }
}

impl std::error::Error for SignalClosed {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const SHORT: Duration = Duration::from_millis(10);

    #[test]
    fn edges_coalesce_into_one_slot() {
        let (notifier, mut signal) = edge_signal();

        assert!(notifier.notify());
        assert!(notifier.notify());

        assert_eq!(signal.wait(SHORT), Ok(true));
        assert_eq!(signal.wait(SHORT), Ok(false));
    }

    #[test]
    fn edge_from_another_thread_wakes_waiter() {
        let (notifier, mut signal) = edge_signal();

        let handle = thread::spawn(move || {
            thread::sleep(SHORT);
            notifier.notify()
        });

        assert_eq!(signal.wait(Duration::from_secs(5)), Ok(true));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn clear_discards_stale_edge() {
        let (notifier, mut signal) = edge_signal();
        notifier.notify();

        signal.clear();

        assert_eq!(signal.wait(SHORT), Ok(false));
    }

    #[test]
    fn closed_ends_are_reported() {
        let (notifier, signal) = edge_signal();
        drop(signal);
        assert!(!notifier.notify());

        let (notifier, mut signal) = edge_signal();
        drop(notifier);
        assert_eq!(signal.wait(SHORT), Err(SignalClosed));
    }
}
