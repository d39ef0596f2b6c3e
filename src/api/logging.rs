//! Per-request logging and the `X-Process-Time` response header

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

/// Seconds spent handling the request, three decimals
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Log each request and its outcome, and report the handling time
pub async fn log_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());

    info!("Request: {} {} from {}", method, path, client);

    let mut response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    info!(
        "Response: {} {} - {} ({:.2}s)",
        method,
        path,
        response.status().as_u16(),
        elapsed
    );

    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.3}")) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    response
}
