//! Per-client request rate limiting
//!
//! Each client address gets a fixed window that opens on its first request.
//! Once the window has elapsed the count starts over.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    started: Instant,
    count: u32,
}

/// A limit of 0 means unlimited requests are allowed.
#[derive(Debug)]
pub struct RateLimiter {
    clients: Mutex<HashMap<IpAddr, ClientWindow>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Record one request from `ip` at `now`. Returns false when the client
    /// has used up its window.
    pub fn check(&self, ip: IpAddr, now: Instant) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        // A poisoned map only holds counters; keep serving with it.
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        let window = self.window;
        clients.retain(|_, c| now.saturating_duration_since(c.started) < window);

        let client = clients.entry(ip).or_insert(ClientWindow {
            started: now,
            count: 0,
        });
        if client.count >= self.max_requests {
            return false;
        }
        client.count += 1;
        true
    }

    /// Number of clients with an open window.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn blocks_after_limit_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.check(ip(1), t0));
        assert!(limiter.check(ip(1), t0 + Duration::from_secs(1)));
        assert!(!limiter.check(ip(1), t0 + Duration::from_secs(2)));
    }

    #[test]
    fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.check(ip(1), t0));
        assert!(limiter.check(ip(2), t0));
        assert!(!limiter.check(ip(1), t0));
    }

    #[test]
    fn window_resets_even_under_steady_traffic() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let t0 = Instant::now();
        assert!(limiter.check(ip(1), t0));
        assert!(limiter.check(ip(1), t0 + Duration::from_secs(4)));
        assert!(!limiter.check(ip(1), t0 + Duration::from_secs(8)));
        // Blocked requests do not extend the window.
        assert!(limiter.check(ip(1), t0 + Duration::from_secs(10)));
    }

    #[test]
    fn idle_clients_are_pruned() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10));
        let t0 = Instant::now();
        limiter.check(ip(1), t0);
        limiter.check(ip(2), t0);
        assert_eq!(limiter.tracked_clients(), 2);
        limiter.check(ip(3), t0 + Duration::from_secs(11));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn zero_means_unlimited() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        let t0 = Instant::now();
        for _ in 0..1000 {
            assert!(limiter.check(ip(1), t0));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
