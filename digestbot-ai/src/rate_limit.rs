// Sliding-window throttling for outbound model calls

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use digestbot_common::error::Error;
use digestbot_common::models::SummaryRequest;
use digestbot_common::traits::SummaryBackend;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// At most `max_calls` acquisitions in any rolling `window`. Callers over
/// the limit wait for the oldest call to age out; nobody is turned away.
pub struct SlidingWindowLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1) as usize,
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn per_minute(max_calls: u32) -> Self {
        Self::new(max_calls, DEFAULT_WINDOW)
    }

    /// Wait until a slot is free, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_claim(Instant::now()) {
                None => return,
                Some(wait) => wait,
            };
            debug!("Rate limit reached ({} calls per {:?}); waiting {:?}", self.max_calls, self.window, wait);
            sleep(wait).await;
        }
    }

    /// Claims a slot and returns `None`, or returns how long until the
    /// oldest call leaves the window.
    fn try_claim(&self, now: Instant) -> Option<Duration> {
        let mut calls = self.calls.lock();
        while let Some(&oldest) = calls.front() {
            if now.duration_since(oldest) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
        if calls.len() < self.max_calls {
            calls.push_back(now);
            return None;
        }
        calls
            .front()
            .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
    }

    /// Calls currently inside the window.
    pub fn calls_in_window(&self) -> usize {
        let now = Instant::now();
        self.calls
            .lock()
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count()
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }
}

/// Rate-limiting layer over another [`SummaryBackend`].
pub struct RateLimited<B> {
    inner: B,
    limiter: Arc<SlidingWindowLimiter>,
}

impl<B> RateLimited<B> {
    pub fn new(inner: B, limiter: Arc<SlidingWindowLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<B: SummaryBackend> SummaryBackend for RateLimited<B> {
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, Error> {
        self.limiter.acquire().await;
        self.inner.summarize(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn calls_under_the_limit_do_not_wait() {
        let limiter = SlidingWindowLimiter::per_minute(3);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(Instant::now(), start);
        assert_eq!(limiter.calls_in_window(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_window_delays_until_oldest_ages_out() {
        let limiter = SlidingWindowLimiter::per_minute(2);
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.acquire().await;

        // third call must wait for the first one to leave the window
        limiter.acquire().await;
        assert_eq!(Instant::now() - start, Duration::from_secs(60));

        // fourth waits for the second one (t=10s)
        limiter.acquire().await;
        assert_eq!(Instant::now() - start, Duration::from_secs(70));
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_caller_stays_pending_inside_the_window() {
        let limiter = SlidingWindowLimiter::per_minute(1);
        limiter.acquire().await;

        let mut second = tokio_test::task::spawn(limiter.acquire());
        tokio_test::assert_pending!(second.poll());

        tokio::time::advance(Duration::from_secs(30)).await;
        tokio_test::assert_pending!(second.poll());

        tokio::time::advance(Duration::from_secs(30)).await;
        tokio_test::assert_ready!(second.poll());
    }

    #[test]
    fn zero_limit_is_clamped_to_one() {
        assert_eq!(SlidingWindowLimiter::per_minute(0).max_calls(), 1);
    }
}
