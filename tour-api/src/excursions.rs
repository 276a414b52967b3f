use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tour_catalog::Excursion;
use tour_shared::{Page, PageRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Public catalogue, no authentication.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/excursions", get(list_open))
        .route("/v1/excursions/{id}", get(get_excursion))
}

async fn list_open(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Excursion>>, AppError> {
    Ok(Json(state.engine.list_open_excursions(page).await?))
}

async fn get_excursion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Excursion>, AppError> {
    Ok(Json(state.engine.get_public_excursion(id).await?))
}
