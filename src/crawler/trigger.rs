//! Single-flight crawl trigger

use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Signal/wait primitive guarding "at most one crawl at a time"
///
/// `trigger` flips the active flag under a mutex, so two racing callers can never
/// both start a crawl. The wake-up goes through a [`Notify`], which keeps a single
/// permit when nobody is waiting yet; a trigger fired before the orchestrator
/// reaches `wait_for_trigger` is therefore not lost.
#[derive(Debug, Default)]
pub struct CrawlTrigger {
    active: Mutex<bool>,
    signal: Notify,
}

impl CrawlTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a crawl
    ///
    /// Returns `false` (and does nothing) when a crawl is already active.
    pub fn trigger(&self) -> bool {
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if *active {
                tracing::warn!("Crawl already in progress, ignoring trigger");
                return false;
            }
            *active = true;
        }

        tracing::info!("Crawl triggered");
        self.signal.notify_one();
        true
    }

    /// Mark a crawl active without waking the waiter
    ///
    /// For callers that run the crawl themselves. Returns `false` when a crawl
    /// is already active.
    pub fn try_begin(&self) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active {
            return false;
        }
        *active = true;
        true
    }

    /// Wait until a crawl is requested
    ///
    /// Returns `false` when `cancel` fires first.
    pub async fn wait_for_trigger(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            _ = self.signal.notified() => true,
            _ = cancel.cancelled() => {
                tracing::debug!("Stopped waiting for crawl trigger");
                false
            }
        }
    }

    /// Mark the active crawl as finished; calling it again is harmless
    pub fn complete_crawl(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active {
            tracing::debug!("Crawl marked complete");
        }
        *active = false;
    }

    pub fn is_crawling(&self) -> bool {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
