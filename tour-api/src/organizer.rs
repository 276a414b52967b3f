use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tour_booking::{OrganizerDashboard, Subscription};
use tour_catalog::{Excursion, ExcursionDetails, ExcursionStatus};
use tour_core::Actor;
use tour_shared::{Page, PageRequest};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::organizer_auth_middleware;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListExcursionsQuery {
    pub status: Option<ExcursionStatus>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl ListExcursionsQuery {
    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.size.unwrap_or(defaults.size),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: ExcursionStatus,
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub total_seats: i32,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/organizer/excursions", get(list).post(create))
        .route(
            "/v1/organizer/excursions/{id}",
            get(get_one).put(update).delete(cancel),
        )
        .route("/v1/organizer/excursions/{id}/status", patch(change_status))
        .route("/v1/organizer/excursions/{id}/capacity", patch(resize))
        .route("/v1/organizer/excursions/{id}/subscriptions", get(subscriptions))
        .route("/v1/organizer/dashboard", get(dashboard))
        .route_layer(from_fn_with_state(state, organizer_auth_middleware))
}

// ============================================================================
// Handlers
// ============================================================================

async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(details): Json<ExcursionDetails>,
) -> Result<(StatusCode, Json<Excursion>), AppError> {
    let excursion = state.engine.create_excursion(actor.id, details).await?;
    Ok((StatusCode::CREATED, Json(excursion)))
}

async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListExcursionsQuery>,
) -> Result<Json<Page<Excursion>>, AppError> {
    let page = state
        .engine
        .list_organizer_excursions(actor.id, query.status, query.page_request())
        .await?;
    Ok(Json(page))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Excursion>, AppError> {
    Ok(Json(state.engine.get_organizer_excursion(actor.id, id).await?))
}

async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(details): Json<ExcursionDetails>,
) -> Result<Json<Excursion>, AppError> {
    Ok(Json(
        state.engine.update_excursion(actor.id, id, details).await?,
    ))
}

async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.engine.cancel_excursion(actor.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Excursion>, AppError> {
    Ok(Json(
        state
            .engine
            .change_excursion_status(actor.id, id, req.status)
            .await?,
    ))
}

async fn resize(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResizeRequest>,
) -> Result<Json<Excursion>, AppError> {
    Ok(Json(
        state
            .engine
            .resize_capacity(actor.id, id, req.total_seats)
            .await?,
    ))
}

async fn subscriptions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Subscription>>, AppError> {
    Ok(Json(
        state
            .engine
            .list_excursion_subscriptions(actor.id, id, page)
            .await?,
    ))
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<OrganizerDashboard>, AppError> {
    Ok(Json(
        state
            .engine
            .organizer_dashboard(actor.id, query.from, query.to)
            .await?,
    ))
}
