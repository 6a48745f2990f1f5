use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding-window limiter keyed by client and route.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Record a request; returns whether it is allowed and how many remain.
    pub fn allow(&self, key: &str, route: &str) -> (bool, u32) {
        let bucket_key = format!("{key}:{route}");
        let now = Instant::now();
        let window = self.window;

        let mut entry = self.buckets.entry(bucket_key).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        (true, remaining.saturating_sub(1))
    }

    /// Whether the budget is spent, without recording a request.
    pub fn exhausted(&self, key: &str, route: &str) -> bool {
        let now = Instant::now();
        self.buckets
            .get(&format!("{key}:{route}"))
            .map(|entry| {
                entry
                    .iter()
                    .filter(|instant| now.duration_since(**instant) < self.window)
                    .count() as u32
                    >= self.max_requests
            })
            .unwrap_or(false)
    }

    /// Drop buckets with no request inside the current window.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let window = self.window;
        let before = self.buckets.len();
        self.buckets.retain(|_, instants| {
            instants.retain(|instant| now.duration_since(*instant) < window);
            !instants.is_empty()
        });
        before - self.buckets.len()
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}
