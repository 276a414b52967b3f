use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tour_booking::Subscription;
use tour_core::Actor;
use tour_shared::{Page, PageRequest};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::client_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    #[serde(default)]
    pub remarks: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/excursions/{id}/subscriptions", post(enroll))
        .route("/v1/client/subscriptions", get(list_mine))
        .route("/v1/client/subscriptions/{id}", get(get_mine))
        .route_layer(from_fn_with_state(state, client_auth_middleware))
}

async fn enroll(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(excursion_id): Path<Uuid>,
    Json(req): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    info!("Client {} requesting a seat on {}", actor.id, excursion_id);
    let subscription = state
        .engine
        .enroll(excursion_id, actor.id, req.remarks)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn list_mine(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Subscription>>, AppError> {
    Ok(Json(
        state.engine.list_client_subscriptions(actor.id, page).await?,
    ))
}

async fn get_mine(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(state.engine.get_client_subscription(actor.id, id).await?))
}
