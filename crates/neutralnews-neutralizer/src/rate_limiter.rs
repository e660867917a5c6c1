use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

struct LimiterState {
    call_count: u32,
    window_started: Instant,
    cooldown_until: Option<Instant>,
}

/// Sliding-window call-rate limiter with a global cooldown escalation.
/// `check` blocks (async) until it is safe to make another call; `cooldown`
/// is invoked once a provider signals rate limiting, after which every
/// caller blocks until the cooldown expires. Pending rate-limited groups
/// are queued separately so they can be retried afterward at reduced
/// concurrency.
pub struct RateLimiter {
    calls_per_minute: u32,
    state: Mutex<LimiterState>,
    retry_queue: Mutex<VecDeque<i64>>,
}

impl RateLimiter {
    pub fn new(calls_per_minute: u32) -> Self {
        Self {
            calls_per_minute,
            state: Mutex::new(LimiterState {
                call_count: 0,
                window_started: Instant::now(),
                cooldown_until: None,
            }),
            retry_queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Blocks until a call slot is available, sleeping out any active
    /// cooldown or exhausted per-minute window first.
    pub async fn check(&self, group_id: i64) {
        loop {
            let sleep_for = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                if let Some(until) = state.cooldown_until {
                    if now < until {
                        Some(until - now)
                    } else {
                        state.cooldown_until = None;
                        state.call_count = 0;
                        state.window_started = now;
                        None
                    }
                } else {
                    if now.duration_since(state.window_started) > Duration::from_secs(60) {
                        state.call_count = 0;
                        state.window_started = now;
                    }
                    if state.call_count >= self.calls_per_minute {
                        let elapsed = now.duration_since(state.window_started);
                        Some(Duration::from_secs(60).saturating_sub(elapsed))
                    } else {
                        state.call_count += 1;
                        None
                    }
                }
            };

            match sleep_for {
                Some(duration) if duration > Duration::ZERO => {
                    warn!(group_id, seconds = duration.as_secs_f64(), "rate limiter sleeping");
                    tokio::time::sleep(duration).await;
                }
                Some(_) => continue,
                None => return,
            }
        }
    }

    /// Forces every subsequent `check` to block for `minutes`, regardless
    /// of remaining per-minute quota. Called after a provider 429/quota
    /// error.
    pub async fn force_cooldown(&self, minutes: u64) {
        let mut state = self.state.lock().await;
        state.cooldown_until = Some(Instant::now() + Duration::from_secs(minutes * 60));
        info!(minutes, "enforcing global cooldown after rate-limit signal");
    }

    pub async fn queue_for_retry(&self, group_id: i64) {
        self.retry_queue.lock().await.push_back(group_id);
    }

    pub async fn drain_retry_queue(&self) -> Vec<i64> {
        let mut queue = self.retry_queue.lock().await;
        queue.drain(..).collect()
    }

    pub async fn has_retry_work(&self) -> bool {
        !self.retry_queue.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_calls_under_the_limit_without_sleeping() {
        let limiter = RateLimiter::new(5);
        for i in 0..5 {
            limiter.check(i).await;
        }
    }

    #[tokio::test]
    async fn queues_and_drains_retries() {
        let limiter = RateLimiter::new(500);
        limiter.queue_for_retry(42).await;
        limiter.queue_for_retry(7).await;
        assert!(limiter.has_retry_work().await);
        let drained = limiter.drain_retry_queue().await;
        assert_eq!(drained, vec![42, 7]);
        assert!(!limiter.has_retry_work().await);
    }
}
