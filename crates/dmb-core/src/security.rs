use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use crate::domain::UserId;

// ============== Authorization ==============

/// Static allow-list check. An empty list authorizes nobody.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    allowed_users.contains(&user_id.0)
}

// ============== Command Rate Limiter (sliding window) ==============

/// Per-user command limiter: at most `max_requests` per `window`.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    enabled: bool,
    max_requests: usize,
    window: Duration,
    history: HashMap<UserId, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(enabled: bool, max_requests: u32, window: Duration) -> Self {
        Self {
            enabled,
            max_requests: max_requests as usize,
            window,
            history: HashMap::new(),
        }
    }

    pub fn check(&mut self, user_id: UserId) -> (bool, Option<Duration>) {
        self.check_at(user_id, Instant::now())
    }

    /// Returns `(allowed, retry_after)`. Allowed calls are counted.
    pub fn check_at(&mut self, user_id: UserId, now: Instant) -> (bool, Option<Duration>) {
        if !self.enabled {
            return (true, None);
        }

        let calls = self.history.entry(user_id).or_default();
        while calls
            .front()
            .map(|t| now.saturating_duration_since(*t) >= self.window)
            .unwrap_or(false)
        {
            calls.pop_front();
        }

        if calls.len() < self.max_requests {
            calls.push_back(now);
            return (true, None);
        }

        let retry_after = calls
            .front()
            .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
            .unwrap_or(self.window);
        (false, Some(retry_after))
    }
}
