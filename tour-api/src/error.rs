use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tour_core::BookingError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::BusinessRule(violation) => AppError::ConflictError(violation.to_string()),
            BookingError::NotFound { .. } => AppError::NotFoundError(err.to_string()),
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::Persistence(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tour_core::BusinessRuleViolation;
    use uuid::Uuid;

    fn status_of(err: BookingError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_booking_errors_map_to_http() {
        assert_eq!(status_of(BusinessRuleViolation::Full.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(BookingError::excursion_not_found(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BookingError::Validation("title too short".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BookingError::persistence("connection reset")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
