//! Cooperative stop flag shared by every engine thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// A clonable stop signal.
///
/// Loops call [`ShutdownSignal::sleep`] instead of `thread::sleep` so a
/// trigger wakes them immediately.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop holding this signal to stop.
    pub fn trigger(&self) {
        let _guard = self.inner.lock.lock();
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.wake.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for up to `duration`, returning early on trigger.
    ///
    /// Returns `true` when the signal has been triggered.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut guard = self.inner.lock.lock();
        if self.is_triggered() {
            return true;
        }
        let _ = self.inner.wake.wait_for(&mut guard, duration);
        self.is_triggered()
    }
}
