use crate::api::ApiError;
use crate::rate_limit::RateLimiter;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

/// One event per request: method, path, status and latency.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let latency = started.elapsed();
    if status.is_server_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), ?latency, "request failed");
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), ?latency, "request");
    }
    response
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if !limiter.check(ip, Instant::now()) {
        tracing::warn!(%ip, "rate limit exceeded");
        return ApiError::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }
    next.run(req).await
}

/// Peer address from the connection; requests built without one (tests,
/// in-process callers) share the unspecified address.
fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
