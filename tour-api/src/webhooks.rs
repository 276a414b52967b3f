use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tour_booking::Subscription;
use tour_core::{PaymentMethod, PaymentStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

/// Status update pushed by the payment gateway (PIX or card).
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub subscription_id: Uuid,
    pub status: PaymentStatus,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    #[serde(default)]
    pub gateway_reference: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

/// POST /v1/webhooks/payments
async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<Subscription>, AppError> {
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("Missing webhook secret".to_string()))?;
    if !secret_matches(presented, &state.webhook_secret) {
        return Err(AppError::AuthenticationError(
            "Invalid webhook secret".to_string(),
        ));
    }

    tracing::info!(
        "Received payment webhook: {} via {:?} for subscription {} (ref {:?})",
        payload.status,
        payload.method,
        payload.subscription_id,
        payload.gateway_reference
    );

    let subscription = state
        .engine
        .record_payment_outcome(payload.subscription_id, payload.status)
        .await?;
    Ok(Json(subscription))
}

fn secret_matches(presented: &str, expected: &str) -> bool {
    constant_time_eq::constant_time_eq(presented.as_bytes(), expected.as_bytes())
}
