use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use x402_types::{ErrorEnvelope, ErrorKind};

use crate::state::AppState;

const BUYER_SECRET_HEADER: &str = "X-Buyer-Secret";

/// Enforces rate limits ahead of payment checks and the handler itself —
/// the cheapest rejection runs first.
pub async fn rate_limit_gate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let buyer_secret = request
        .headers()
        .get(BUYER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    let client_ip = addr.ip().to_string();

    match state
        .rate_limiter
        .check(&path, buyer_secret, Some(&client_ip))
        .await
    {
        x402_ratelimit::LimitDecision::Allowed => next.run(request).await,
        x402_ratelimit::LimitDecision::Denied {
            limit,
            window_seconds,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorEnvelope::new(
                ErrorKind::RateLimited,
                format!("Rate limit exceeded. Limit: {limit} requests per {window_seconds} seconds."),
            )),
        )
            .into_response(),
    }
}
