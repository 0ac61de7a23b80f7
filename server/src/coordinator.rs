//! Occupancy coordinator.
//!
//! A monitor over the zone occupancy count. `enter` waits while the zone is
//! full, `leave` waits while the zone is at its floor. One mutex guards the
//! count and every state change broadcasts on a single condvar: a decrement
//! may release waiting enters and an increment may release waiting leaves,
//! so each waiter re-checks its own bound after every wake. Nothing is
//! served in FIFO order; which waiter wins a freed slot is up to the
//! scheduler.
//!
//! Callers must pair each `leave` with an earlier successful `enter` for the
//! same entity. The coordinator does not track who is inside, so unbalanced
//! calls go undetected and skew the count.

use std::sync::{Condvar, Mutex, PoisonError};

use crate::error::Interrupted;
use crate::interrupt::Interrupt;
use crate::sync::lock;

/// Direction of a zone boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    Enter,
    Leave,
}

#[derive(Debug)]
pub struct OccupancyCoordinator {
    count: Mutex<u32>,
    changed: Condvar,
    min: u32,
    max: u32,
}

impl OccupancyCoordinator {
    /// Create a coordinator with an empty zone. `min` must be below `max`.
    pub fn new(min: u32, max: u32) -> Self {
        debug_assert!(min < max, "occupancy bounds must satisfy min < max");
        Self {
            count: Mutex::new(0),
            changed: Condvar::new(),
            min,
            max,
        }
    }

    /// Block until the zone has room, then count one more occupant.
    pub fn enter(&self) {
        // Without an interrupt the wait only ends once the bound admits us.
        let _ = self.cross(Crossing::Enter, None);
    }

    /// Block until the zone is above its floor, then count one occupant out.
    pub fn leave(&self) {
        let _ = self.cross(Crossing::Leave, None);
    }

    /// Like [`enter`](Self::enter), but gives up with `Err(Interrupted)` if
    /// `interrupt` is raised while the zone is still full. The count is left
    /// untouched on error.
    pub fn enter_interruptible(&self, interrupt: &Interrupt) -> Result<(), Interrupted> {
        self.cross(Crossing::Enter, Some(interrupt))
    }

    /// Like [`leave`](Self::leave), interruptible while the zone is at its floor.
    pub fn leave_interruptible(&self, interrupt: &Interrupt) -> Result<(), Interrupted> {
        self.cross(Crossing::Leave, Some(interrupt))
    }

    /// Wake every waiter so it re-checks its bound and its interrupt.
    pub fn wake_all(&self) {
        let _guard = lock(&self.count);
        self.changed.notify_all();
    }

    /// Current occupancy. Stale as soon as it returns.
    pub fn count(&self) -> u32 {
        *lock(&self.count)
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    fn blocked(&self, crossing: Crossing, count: u32) -> bool {
        match crossing {
            Crossing::Enter => count >= self.max,
            Crossing::Leave => count <= self.min,
        }
    }

    fn cross(&self, crossing: Crossing, interrupt: Option<&Interrupt>) -> Result<(), Interrupted> {
        let interrupted = || interrupt.is_some_and(Interrupt::is_raised);
        let guard = lock(&self.count);
        let mut count = self
            .changed
            .wait_while(guard, |count| {
                self.blocked(crossing, *count) && !interrupted()
            })
            .unwrap_or_else(PoisonError::into_inner);

        if self.blocked(crossing, *count) {
            return Err(Interrupted);
        }

        match crossing {
            Crossing::Enter => *count += 1,
            Crossing::Leave => *count -= 1,
        }
        self.changed.notify_all();
        Ok(())
    }
}
