//! Engine clock: monotonic milliseconds since the supervisor started
//!
//! Built on `tokio::time::Instant` so paused-time tests drive it too.

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct EngineClock {
    epoch: Instant,
}

impl EngineClock {
    pub fn start() -> Self {
        Self { epoch: Instant::now() }
    }

    pub fn now_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    pub fn instant_at(&self, at_ms: i64) -> Instant {
        self.epoch + Duration::from_millis(at_ms.max(0) as u64)
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        Self::start()
    }
}
