use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Time source and sleep primitive used by every timed loop.
///
/// Production code uses [`TokioClock`]; tests substitute a virtual clock or
/// run on a paused tokio runtime so backoff and stall rules can be exercised
/// without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
