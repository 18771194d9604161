//! Cancellable fixed-interval ticker.
//!
//! The acquisition loop waits between iterations on a [`Ticker`] instead of sleeping.
//! [`Ticker::cancel`] wakes a pending wait at once, so joining the loop takes at most
//! one in-flight iteration rather than a full interval.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Shared {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Fixed-interval ticker shared between the loop and whoever cancels it.
#[derive(Clone)]
pub struct Ticker {
    interval: Duration,
    shared: Arc<Shared>,
}

impl Ticker {
    /// Create a ticker firing every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            shared: Arc::new(Shared::default()),
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the next tick. Returns `false` if cancelled before or during the wait.
    pub fn wait(&self) -> bool {
        let deadline = Instant::now() + self.interval;
        let mut cancelled = self.shared.cancelled.lock();
        while !*cancelled {
            if self.shared.wake.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        !*cancelled
    }

    /// True once cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.shared.cancelled.lock()
    }

    /// Cancel and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        *self.shared.cancelled.lock() = true;
        self.shared.wake.notify_all();
    }
}
