//! Per-client-IP request rate limiting for the login and keep-alive endpoints.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::auth::extractors::ClientContext;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub login_per_minute: u32,
    pub ping_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_per_minute: 10,
            ping_per_minute: 6,
        }
    }
}

/// Token bucket per client IP.
#[derive(Clone)]
pub struct IpRateLimiter {
    name: &'static str,
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl IpRateLimiter {
    pub fn per_minute(name: &'static str, requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
        Self {
            name,
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    pub fn check(&self, ip: &str) -> Result<(), AppError> {
        self.limiter.check_key(&ip.to_string()).map_err(|_| {
            tracing::warn!(limiter = self.name, %ip, "Rate limit exceeded");
            AppError::RateLimited
        })
    }

    /// Drops buckets that are back to full capacity.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

/// Rate limiting middleware, keyed by the same client IP the login sees.
pub async fn limit_by_ip(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = ClientContext::from_request_head(request.headers(), request.extensions());
    limiter.check(&client.ip)?;

    Ok(next.run(request).await)
}
