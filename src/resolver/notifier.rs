//! One-shot completion signal.
//!
//! The resolver's tasks finish in arbitrary order; whichever one drives the
//! outstanding-node count to zero calls [`CompletionNotifier::notify`]. The
//! atomic flag makes every later call a no-op, so the waiting side receives
//! exactly one event.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

/// Sending half; shared by all resolver tasks.
#[derive(Debug)]
pub struct CompletionNotifier<T> {
    fired: AtomicBool,
    attempts: AtomicUsize,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

/// Receiving half; awaited by whoever started the resolution.
#[derive(Debug)]
pub struct CompletionSignal<T> {
    receiver: oneshot::Receiver<T>,
}

#[must_use]
pub fn completion_channel<T>() -> (CompletionNotifier<T>, CompletionSignal<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        CompletionNotifier {
            fired: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            sender: Mutex::new(Some(sender)),
        },
        CompletionSignal {
            receiver,
        },
    )
}

impl<T> CompletionNotifier<T> {
    /// Delivers `value` unless the notifier already fired.
    ///
    /// Returns `true` for the one call that fired.
    pub fn notify(&self, value: T) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sender) = sender {
            // The receiver may have been dropped; the event still counts
            let _ = sender.send(value);
        }
        true
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Number of times [`notify`](Self::notify) was called, fired or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl<T> CompletionSignal<T> {
    /// Waits for the event. `None` if the notifier was dropped unfired.
    pub async fn wait(self) -> Option<T> {
        self.receiver.await.ok()
    }
}
