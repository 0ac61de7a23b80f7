//! Per-worker interruption.
//!
//! Raising an [`Interrupt`] makes the owning worker's current or next
//! blocking call fail with [`Interrupted`]: the pacing sleep is woken
//! directly, coordinator waits observe the flag once the coordinator
//! broadcasts (see `OccupancyCoordinator::wake_all`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::error::Interrupted;
use crate::sync::lock;

#[derive(Debug, Default)]
pub struct Interrupt {
    raised: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the interrupt and wake a sleeping owner. Sticky: never cleared.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        // Taking the lock orders the store before a sleeper's predicate check.
        let _guard = lock(&self.lock);
        self.wake.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_raised() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration` unless interrupted first.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let guard = lock(&self.lock);
        let _ = self
            .wake
            .wait_timeout_while(guard, duration, |_| !self.is_raised())
            .unwrap_or_else(PoisonError::into_inner);
        self.check()
    }
}
