use crate::constants::rate_limit;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window limiter: at most `max_requests` acquisitions within any `window`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A `max_requests` of zero disables limiting.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            stamps: Mutex::new(VecDeque::with_capacity(max_requests as usize)),
        }
    }

    pub fn per_second(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_millis(rate_limit::WINDOW_MS))
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }

    /// Waits until a slot is free, then claims it.
    pub async fn acquire(&self) {
        if !self.is_enabled() {
            return;
        }
        // The lock is held while waiting so that waiters are admitted in arrival order.
        let mut stamps = self.stamps.lock().await;
        loop {
            let now = Instant::now();
            while let Some(oldest) = stamps.front() {
                if now.duration_since(*oldest) >= self.window {
                    stamps.pop_front();
                } else {
                    break;
                }
            }
            if stamps.len() < self.max_requests as usize {
                stamps.push_back(now);
                return;
            }
            let oldest = match stamps.front() {
                Some(oldest) => *oldest,
                None => continue,
            };
            tokio::time::sleep_until(oldest + self.window).await;
        }
    }
}
