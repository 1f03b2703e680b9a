/// Request protection helpers
/// - Per-IP rate limiting for credential endpoints (brute-force protection)
/// - Security headers applied to every response

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Token bucket refilled continuously at `refill_rate` tokens per second
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: u32,
    refill_rate: f64,
}

impl TokenBucket {
    fn new(requests_per_minute: u32) -> Self {
        Self {
            tokens: requests_per_minute as f64,
            last_refill: Instant::now(),
            capacity: requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
        }
    }

    /// A bucket that has refilled completely carries no state worth keeping
    fn is_full(&self) -> bool {
        let refilled = self.tokens + self.last_refill.elapsed().as_secs_f64() * self.refill_rate;
        refilled >= self.capacity as f64
    }

    fn try_take_token(&mut self) -> bool {
        let elapsed_secs = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed_secs * self.refill_rate).min(self.capacity as f64);
        self.last_refill = Instant::now();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Rate limiter manager - tracks a bucket per client IP
pub struct RateLimiterManager {
    requests_per_minute: u32,
    limiters: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiterManager {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for `ip`; `false` once the bucket is empty
    pub fn check_rate_limit(&self, ip: &str) -> bool {
        // A poisoned lock only means another request panicked mid-update;
        // the buckets themselves are still usable.
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());

        // A fresh bucket behaves exactly like a full one, so drop those
        limiters.retain(|_, bucket| !bucket.is_full());

        limiters
            .entry(ip.to_string())
            .or_insert_with(|| TokenBucket::new(self.requests_per_minute))
            .try_take_token()
    }
}

/// Security headers for HTTP responses
pub struct SecurityHeaders;

impl SecurityHeaders {
    pub fn get_headers() -> Vec<(&'static str, &'static str)> {
        vec![
            ("X-Content-Type-Options", "nosniff"),
            ("X-Frame-Options", "DENY"),
            ("Referrer-Policy", "strict-origin-when-cross-origin"),
            ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
            ("Cache-Control", "no-store"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_initial_request() {
        let manager = RateLimiterManager::new(10);
        assert!(manager.check_rate_limit("127.0.0.1"));
    }

    #[test]
    fn test_rate_limiter_exhausts_bucket() {
        let manager = RateLimiterManager::new(3);
        for _ in 0..3 {
            assert!(manager.check_rate_limit("10.0.0.1"));
        }
        assert!(!manager.check_rate_limit("10.0.0.1"));
    }

    #[test]
    fn test_rate_limiter_is_per_ip() {
        let manager = RateLimiterManager::new(1);
        assert!(manager.check_rate_limit("10.0.0.1"));
        assert!(!manager.check_rate_limit("10.0.0.1"));
        assert!(manager.check_rate_limit("10.0.0.2"));
    }

    #[test]
    fn test_idle_buckets_are_evicted() {
        // 1000 tokens per second, so one spent token is back within a few ms
        let manager = RateLimiterManager::new(60_000);
        assert!(manager.check_rate_limit("10.0.0.1"));
        assert!(manager.check_rate_limit("10.0.0.2"));

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(manager.check_rate_limit("10.0.0.3"));

        let limiters = manager.limiters.lock().unwrap();
        assert_eq!(limiters.len(), 1);
        assert!(limiters.contains_key("10.0.0.3"));
    }

    #[test]
    fn test_exhausted_bucket_survives_eviction() {
        let manager = RateLimiterManager::new(1);
        assert!(manager.check_rate_limit("10.0.0.1"));

        // Another client's request triggers eviction, the empty bucket stays
        assert!(manager.check_rate_limit("10.0.0.2"));
        assert!(!manager.check_rate_limit("10.0.0.1"));
    }

    #[test]
    fn test_security_headers() {
        let headers = SecurityHeaders::get_headers();
        let names: Vec<_> = headers.iter().map(|(name, _)| *name).collect();

        assert!(names.contains(&"X-Content-Type-Options"));
        assert!(names.contains(&"X-Frame-Options"));
    }
}
