//! Cancellable pauses between crawl steps

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pause used between repositories and after unexpected failures
#[async_trait]
pub trait Delay: Send + Sync {
    /// Sleep for `duration`; returns `false` if `cancel` fired first
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool;
}

/// Real wall-clock delay backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        if duration.is_zero() {
            return !cancel.is_cancelled();
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = cancel.cancelled() => false,
        }
    }
}
