//! Sliding-window rate limiter

use log::debug;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Default rate window
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Allows at most `limit` acquisitions per rolling `window`
///
/// Callers beyond the limit suspend until the oldest acquisition leaves the
/// window. The waiter holding the lock is the next one released, and tokio's
/// mutex queues the others fairly, so slots are granted FIFO by arrival.
pub struct SlidingWindowLimiter {
    limit: u32,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            grants: Mutex::new(VecDeque::new()),
        }
    }

    /// `requests_per_minute` over the default 60 s window
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(requests_per_minute, DEFAULT_RATE_WINDOW)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for a free slot and take it
    pub async fn acquire(&self) {
        let mut grants = self.grants.lock().await;

        loop {
            let now = Instant::now();
            while let Some(&oldest) = grants.front() {
                if now.duration_since(oldest) >= self.window {
                    grants.pop_front();
                } else {
                    break;
                }
            }

            if grants.len() < self.limit as usize {
                grants.push_back(now);
                return;
            }

            // Full window: the front grant is the next to expire
            if let Some(&oldest) = grants.front() {
                let ready_at = oldest + self.window;
                debug!(
                    "[RATE] window full ({} / {:?}), waiting {:?}",
                    self.limit,
                    self.window,
                    ready_at.saturating_duration_since(now)
                );
                sleep_until(ready_at).await;
            }
        }
    }

    /// Slots taken within the current window
    pub async fn in_window(&self) -> usize {
        let grants = self.grants.lock().await;
        let now = Instant::now();
        grants
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }
}
