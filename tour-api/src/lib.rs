use axum::{
    http::{header, Method},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod excursions;
pub mod middleware;
pub mod organizer;
pub mod state;
pub mod subscriptions;
pub mod webhooks;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::USER_AGENT,
        ]);

    Router::new()
        .route("/health", get(health))
        .merge(excursions::routes())
        .merge(subscriptions::routes(state.clone()))
        .merge(organizer::routes(state.clone()))
        .merge(webhooks::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
