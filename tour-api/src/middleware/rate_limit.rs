use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use tour_store::redis_repo::rate_limit_key;

use crate::state::AppState;

/// Fixed-window limit per client IP. Fails open when Redis is absent or erroring.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };

    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let limit = &state.rate_limit;
    match redis
        .check_rate_limit(&rate_limit_key(&ip), limit.requests_per_window, limit.window_seconds)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Rate limit exceeded" })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Rate limiter unavailable, letting request through: {}", e);
            next.run(req).await
        }
    }
}
