use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Requests allowed per client per window.
const RATE_LIMIT_MAX: usize = 10;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// Client count that triggers a sweep of stale entries.
const SWEEP_THRESHOLD: usize = 1000;

/// Sliding-window request limiter keyed by client address. In-memory and
/// per-process, like the rest of the degraded-mode state; a multi-instance
/// deployment rate-limits per instance.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hit for `key` and reports whether it stays inside the
    /// window. Denied hits are not recorded, so hammering while limited
    /// does not extend the lockout.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let hits = windows.entry(key.to_string()).or_default();
        hits.retain(|t| now.duration_since(*t) < RATE_LIMIT_WINDOW);
        if hits.len() >= RATE_LIMIT_MAX {
            return false;
        }
        hits.push(now);

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, hits| {
                hits.retain(|t| now.duration_since(*t) < RATE_LIMIT_WINDOW);
                !hits.is_empty()
            });
        }
        true
    }
}
