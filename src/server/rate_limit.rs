//! Per-client request rate limiting
//!
//! Requests are counted in fixed windows keyed by client IP and request
//! path. Once a key has used its allowance the remaining requests in that
//! window get `429 Too Many Requests`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::routes::AppState;

/// Requests allowed per client and endpoint in each window by default
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 100;

/// Window count above which expired windows are pruned
const PRUNE_THRESHOLD: usize = 4096;

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window request counter
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl RateLimiter {
    /// Allow `limit` requests per key in every `window`
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Allow `limit` requests per key every second
    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    /// Requests allowed per window
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count a request from `client` to `endpoint`
    pub async fn check(&self, client: &str, endpoint: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now < w.started + window);
        }

        let state = windows
            .entry((client.to_owned(), endpoint.to_owned()))
            .or_insert(Window { count: 0, started: now });

        if now >= state.started + self.window {
            state.count = 0;
            state.started = now;
        }

        if state.count >= self.limit {
            let retry_after = (state.started + self.window).saturating_duration_since(now);
            return RateDecision::Limited { retry_after };
        }

        state.count += 1;
        RateDecision::Allowed {
            remaining: self.limit - state.count,
        }
    }
}

/// Reject clients that exceed the configured request rate
///
/// Passes everything through when no limiter is configured.
pub async fn rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.limiter.clone() else {
        return next.run(request).await;
    };

    let client = client_ip(request.headers(), connect_info.as_ref());
    let endpoint = request.uri().path().to_owned();

    match limiter.check(&client, &endpoint).await {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limiter.limit()));
            headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { retry_after } => {
            tracing::debug!(client = %client, endpoint = %endpoint, "Rate limit exceeded");
            limited_response(limiter.limit(), retry_after)
        }
    }
}

/// Client address, preferring proxy headers over the socket peer
fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_owned();
    }

    if let Some(ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        return ip.trim().to_owned();
    }

    connect_info
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn limited_response(limit: u32, retry_after: Duration) -> Response {
    // Whole seconds, rounded up
    let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    let retry_secs = retry_secs.max(1);

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "Rate limit exceeded",
            "retry_after_secs": retry_secs,
        })),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(0u32));
    headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_secs));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limits_per_client_and_endpoint() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert_eq!(
            limiter.check("10.0.0.1", "/a").await,
            RateDecision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check("10.0.0.1", "/a").await,
            RateDecision::Allowed { remaining: 0 }
        );
        assert!(matches!(
            limiter.check("10.0.0.1", "/a").await,
            RateDecision::Limited { .. }
        ));

        assert!(matches!(
            limiter.check("10.0.0.1", "/b").await,
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("10.0.0.2", "/a").await,
            RateDecision::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50));

        assert!(matches!(limiter.check("c", "/").await, RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check("c", "/").await, RateDecision::Limited { .. }));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(matches!(limiter.check("c", "/").await, RateDecision::Allowed { .. }));
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "192.168.1.9:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(&ConnectInfo(peer))), "192.168.1.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.1.1.1"));
        assert_eq!(client_ip(&headers, Some(&ConnectInfo(peer))), "10.1.1.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("10.2.2.2, 172.16.0.1"));
        assert_eq!(client_ip(&headers, Some(&ConnectInfo(peer))), "10.2.2.2");
    }

    #[test]
    fn test_limited_response_rounds_retry_up() {
        let response = limited_response(5, Duration::from_millis(1200));

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[axum::http::header::RETRY_AFTER], "2");
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
    }
}
