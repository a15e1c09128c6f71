use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_RATE_LIMIT_MAX: usize = 60;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window message limiter for one connection.
///
/// Admits at most `max_messages` within any window of length `window`.
/// Rejected messages do not count against the window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_messages: usize,
    window: Duration,
    accepted: VecDeque<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            max_messages,
            window,
            accepted: VecDeque::with_capacity(max_messages),
        }
    }

    /// Try to admit one message arriving at `now`
    pub fn check(&mut self, now: Instant) -> bool {
        while let Some(oldest) = self.accepted.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.accepted.pop_front();
            } else {
                break;
            }
        }

        if self.accepted.len() >= self.max_messages {
            return false;
        }
        self.accepted.push_back(now);
        true
    }

    /// Messages currently counted in the window
    pub fn in_window(&self) -> usize {
        self.accepted.len()
    }
}
