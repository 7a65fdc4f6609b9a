// src/utils/rate_limit.rs

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::{Arc, RwLock},
};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota};

use crate::{config::RateLimitConfig, error::AppError};

/// In-process limiter keyed by client IP and request path.
///
/// `max_requests` may be spent at once; the allowance then refills evenly
/// over `window`. When the store holds `capacity` keys, keys that are no
/// longer limited are swept. If every key is still active the store starts
/// over empty.
pub struct RateLimiter {
    quota: Quota,
    capacity: usize,
    keys: RwLock<Arc<DefaultKeyedRateLimiter<String>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let burst = u32::try_from(config.max_requests)
            .ok()
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(config.window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            quota,
            capacity: config.capacity.max(1),
            keys: RwLock::new(Arc::new(DefaultKeyedRateLimiter::<String>::keyed(quota))),
        }
    }

    fn current(&self) -> Arc<DefaultKeyedRateLimiter<String>> {
        match self.keys.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn start_over(&self) -> Arc<DefaultKeyedRateLimiter<String>> {
        let fresh = Arc::new(DefaultKeyedRateLimiter::<String>::keyed(self.quota));
        let mut guard = match self.keys.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = fresh.clone();
        fresh
    }

    /// Records a hit for `key`. Returns false when the key is over its limit.
    pub fn check(&self, key: &str) -> bool {
        let mut limiter = self.current();
        if limiter.len() >= self.capacity {
            limiter.retain_recent();
            limiter.shrink_to_fit();
            if limiter.len() >= self.capacity {
                tracing::warn!("Rate limit store full ({} keys), starting over", limiter.len());
                limiter = self.start_over();
            }
        }
        limiter.check_key(&key.to_string()).is_ok()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.current().len()
    }
}

/// Resolves the client address: first `x-forwarded-for` hop, then the peer address.
fn client_ip(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum Middleware: throttles write requests per (ip, path).
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(req).await);
    }

    let key = format!("{}|{}", client_ip(&req), req.uri().path());
    if !limiter.check(&key) {
        tracing::warn!("Rate limit exceeded for {}", key);
        return Err(AppError::TooManyRequests);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    fn limiter(window: Duration, max_requests: usize, capacity: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window,
            max_requests,
            capacity,
        })
    }

    #[test]
    fn blocks_after_max_requests_within_window() {
        let limiter = limiter(Duration::from_secs(60), 2, 10);
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        // other keys are independent
        assert!(limiter.check("b"));
    }

    #[test]
    fn allowance_refills_over_the_window() {
        let limiter = limiter(Duration::from_millis(200), 1, 10);
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        thread::sleep(Duration::from_millis(300));
        assert!(limiter.check("a"));
    }

    #[test]
    fn full_store_sweeps_idle_keys() {
        let limiter = limiter(Duration::from_millis(50), 1, 2);
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        thread::sleep(Duration::from_millis(150));
        assert!(limiter.check("c"));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn store_never_outgrows_capacity() {
        let limiter = limiter(Duration::from_secs(60), 1, 2);
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(limiter.check("c"));
        assert!(limiter.tracked_keys() <= 2);
        for key in ["d", "e", "f", "g"] {
            assert!(limiter.check(key));
            assert!(limiter.tracked_keys() <= 2);
        }
    }
}
