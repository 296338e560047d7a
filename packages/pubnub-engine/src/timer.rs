//! Timer interface used by wait and retry effects.

use std::time::Duration;

use async_trait::async_trait;

/// Schedules a wake-up after a delay.
///
/// Cancellation happens by dropping the future, so implementations must not
/// hold resources across the await that outlive it.
#[async_trait]
pub trait Timer: Send + Sync + 'static {
    /// Complete after `duration` has elapsed.
    async fn sleep(&self, duration: Duration);
}

/// Timer backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
