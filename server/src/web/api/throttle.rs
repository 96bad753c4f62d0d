//! Per-user request rate limiting for the REST API.
//!
//! The throttle uses a fixed time window per user: the first request opens the window, further
//! requests count against the limit until the window has elapsed. This matches the throttling
//! the API clients were written against, so the Retry-After hint is the remaining window time.

use crate::data_store::UserId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_LIMIT: u32 = 100;
const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, PartialEq)]
pub struct ThrottledError {
    pub retry_after_secs: u64,
}

pub struct UserRateThrottle {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<UserId, UserWindow>>,
}

struct UserWindow {
    started: Instant,
    count: u32,
}

impl Default for UserRateThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl UserRateThrottle {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request of the given user against their rate limit.
    ///
    /// Returns an error with the remaining window time when the limit is exhausted; the
    /// rejected request does not count against the next window.
    pub fn check_rate_limit(&self, user_id: UserId) -> Result<(), ThrottledError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("Error while locking mutex.");

        let window = windows.entry(user_id).or_insert(UserWindow {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.limit {
            let elapsed = now.duration_since(window.started);
            return Err(ThrottledError {
                retry_after_secs: self.window.saturating_sub(elapsed).as_secs().max(1),
            });
        }
        window.count += 1;
        Ok(())
    }
}
