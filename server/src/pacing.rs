use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use zone_shared::protocol::PacingDirection;

pub const MIN_PACING_MS: u32 = 1;
pub const MAX_PACING_MS: u32 = 100;
pub const DEFAULT_PACING_MS: u32 = 40;

/// Sleep between worker steps, shared by every worker.
///
/// Reads and writes are relaxed and sit outside the coordinator's lock: a
/// worker seeing the old value for one more step is harmless.
#[derive(Debug)]
pub struct Pacing {
    delay_ms: AtomicU32,
}

impl Pacing {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms: AtomicU32::new(delay_ms.clamp(MIN_PACING_MS, MAX_PACING_MS)),
        }
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms.load(Ordering::Relaxed)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms() as u64)
    }

    /// Step the delay by one millisecond, clamped. Returns the new delay.
    pub fn adjust(&self, direction: PacingDirection) -> u32 {
        let step = |ms: u32| match direction {
            PacingDirection::Up => (ms + 1).min(MAX_PACING_MS),
            PacingDirection::Down => ms.saturating_sub(1).max(MIN_PACING_MS),
        };
        let previous = self
            .delay_ms
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |ms| Some(step(ms)))
            .unwrap_or_else(|ms| ms);
        step(previous)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(DEFAULT_PACING_MS)
    }
}
