//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tally_eval::ScoringService;
use tally_storage::MemoryStore;
use tokio::sync::Mutex;

/// Requests seen from one IP in the current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    started: Instant,
}

/// In-memory fixed-window rate limiter keyed by client IP.
pub(crate) struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Count a request from `ip`.
    ///
    /// Returns `Err(retry_after_secs)` once the IP has used up its window.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(ip).or_insert(Window {
            count: 0,
            started: now,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                count: 0,
                started: now,
            };
        }

        entry.count += 1;
        if entry.count <= self.max_requests {
            return Ok(());
        }
        let remaining = self
            .window
            .saturating_sub(now.saturating_duration_since(entry.started));
        // Round up so clients never retry early.
        Err(remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0))
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) service: ScoringService<MemoryStore>,
    pub(crate) rate_limiter: RateLimiter,
    /// Optional API key for authentication. None = no auth required.
    pub(crate) api_key: Option<String>,
}
