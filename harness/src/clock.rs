//! Time abstraction so confirmation delays and bounds run on paused tokio
//! time in tests while production drivers use the real clock.

use std::future::Future;
use std::pin::Pin;
use tokio::time::{self, Duration, Instant};

/// Time source the chain and harness depend on.
///
/// Injecting an implementation keeps every sleep and deadline under test
/// control; nothing in this crate reads wall-clock time directly.
pub trait Clock: Send + Sync {
    /// Current instant. Under a paused runtime this is the simulated time.
    fn now(&self) -> Instant;

    /// Sleep for the given duration. Under a paused runtime this cooperates
    /// with tokio's auto-advance instead of waiting for real time.
    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Real-time clock for production drivers.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Paused clock for deterministic tests.
///
/// [`PausedClock::new`] pauses tokio time, so use it from a plain
/// `#[tokio::test]`. With `#[tokio::test(start_paused = true)]` time is
/// already paused; construct the unit struct directly there.
pub struct PausedClock;

impl PausedClock {
    pub fn new() -> Self {
        time::pause();
        Self
    }

    /// Advance simulated time, waking any sleeps that expire on the way.
    pub async fn advance(&self, d: Duration) {
        time::advance(d).await
    }
}

impl Clock for PausedClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

impl Default for PausedClock {
    fn default() -> Self {
        Self::new()
    }
}
