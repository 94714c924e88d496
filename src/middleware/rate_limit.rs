// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-IP rate limiting for the account endpoints.
//!
//! Clients are keyed by socket peer address. A forwarding header is only
//! consulted when `TRUSTED_PROXY_HEADER` names one. Every response carries
//! `RateLimit-*` headers describing the caller's budget.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::StateInformationMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

/// Window over which the full budget is allowed.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

type KeyedLimiter = RateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    DefaultClock,
    StateInformationMiddleware,
>;

/// Outcome of charging one request to a client's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, reset: Duration },
    Limited { retry_after: Duration },
}

/// Per-IP limiter allowing `limit` requests per [`RATE_LIMIT_WINDOW`].
///
/// The full budget is available as a burst and refills evenly over the window.
pub struct IpLimiter {
    limiter: KeyedLimiter,
    limit: u32,
    replenish: Duration,
}

impl IpLimiter {
    pub fn new(per_window: u32) -> Self {
        let burst = NonZeroU32::new(per_window).unwrap_or(NonZeroU32::MIN);
        let replenish = RATE_LIMIT_WINDOW / burst.get();
        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
            limit: burst.get(),
            replenish,
        }
    }

    /// Charge one request to `key`.
    pub fn check(&self, key: &str) -> Decision {
        match self.limiter.check_key(&key.to_string()) {
            Ok(snapshot) => {
                let remaining = snapshot.remaining_burst_capacity();
                Decision::Allowed {
                    remaining,
                    reset: self.replenish * self.limit.saturating_sub(remaining),
                }
            }
            Err(not_until) => Decision::Limited {
                retry_after: not_until.wait_time_from(self.limiter.clock().now()),
            },
        }
    }

    /// Write the `RateLimit-*` headers for a decision.
    fn apply_headers(&self, decision: Decision, headers: &mut HeaderMap) {
        let (remaining, reset) = match decision {
            Decision::Allowed { remaining, reset } => (remaining, reset),
            Decision::Limited { retry_after } => {
                headers.insert("retry-after", seconds(retry_after));
                (0, retry_after)
            }
        };

        headers.insert(
            "ratelimit-policy",
            header_value(format!("{};w={}", self.limit, RATE_LIMIT_WINDOW.as_secs())),
        );
        headers.insert("ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("ratelimit-remaining", HeaderValue::from(remaining));
        headers.insert("ratelimit-reset", seconds(reset));
    }
}

/// Whole seconds, rounded up.
fn seconds(duration: Duration) -> HeaderValue {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    HeaderValue::from(secs)
}

fn header_value(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

/// Client address used as the limiter key.
///
/// With a trusted proxy header configured, its first entry wins. Otherwise,
/// or when the header is absent, the socket peer address is used.
pub fn client_ip(request: &Request, trusted_header: Option<&str>) -> String {
    let forwarded = trusted_header
        .and_then(|name| request.headers().get(name))
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware enforcing the account endpoint rate limit.
pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request, state.config.trusted_proxy_header.as_deref());
    let decision = state.auth_limiter.check(&ip);

    let mut response = match decision {
        Decision::Allowed { .. } => next.run(request).await,
        Decision::Limited { .. } => {
            tracing::warn!(ip = %ip, "Rate limit exceeded on account endpoint");
            AppError::TooManyRequests.into_response()
        }
    };

    state
        .auth_limiter
        .apply_headers(decision, response.headers_mut());
    response
}
