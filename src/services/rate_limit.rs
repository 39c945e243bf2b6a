//! Per-client request limiting.
//!
//! Each client IP gets a fixed window of `max_requests` requests. The window
//! restarts on the first request after it has elapsed.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::services::cache::{Clock, SystemClock};

/// Clients tracked at once. Past this, stale windows are purged first and
/// then the oldest window is dropped.
pub const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    max_requests: u32,
    window: Duration,
    max_clients: usize,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
            max_clients: MAX_TRACKED_CLIENTS,
            clock,
        }
    }

    /// `max_requests` per minute per client on the wall clock.
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60), Arc::new(SystemClock))
    }

    #[cfg(test)]
    fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    /// Count one request from `ip`; false once its window is used up.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows.lock();

        if !windows.contains_key(&ip) && windows.len() >= self.max_clients {
            windows.retain(|_, window| now.duration_since(window.started) < self.window);
            if windows.len() >= self.max_clients {
                let oldest = windows
                    .iter()
                    .min_by_key(|(_, window)| window.started)
                    .map(|(ip, _)| *ip);
                if let Some(oldest) = oldest {
                    windows.remove(&oldest);
                }
            }
        }

        let window = windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}
