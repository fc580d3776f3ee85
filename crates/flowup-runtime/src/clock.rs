//! Monotonic time source with cooperative sleep

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Time source consumed by peer loops and the watcher
pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since the clock's origin; never decreases
    fn now(&self) -> Duration;

    /// Yield to the scheduler for `duration`
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Clock backed by tokio's timer. Under a paused runtime it follows
/// tokio's virtual time.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    /// Start a clock at the current instant
    pub fn new() -> Self {
        TokioClock {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
