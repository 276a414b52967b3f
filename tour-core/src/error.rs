use std::error::Error;
use uuid::Uuid;

/// Rejections of a booking operation. Always surfaced to the caller, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusinessRuleViolation {
    #[error("not active")]
    NotActive,

    #[error("full")]
    Full,

    #[error("duplicate")]
    Duplicate,

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("cannot activate an excursion whose departure is in the past")]
    DepartureInPast,

    #[error("cannot shrink below current bookings (requested {requested}, occupied {occupied})")]
    ShrinkBelowBookings { requested: i32, occupied: i32 },

    #[error("has active subscriptions ({occupied} seats occupied)")]
    HasActiveSubscriptions { occupied: i32 },
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("business rule violated: {0}")]
    BusinessRule(#[from] BusinessRuleViolation),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(#[source] Box<dyn Error + Send + Sync>),
}

impl BookingError {
    pub fn excursion_not_found(id: Uuid) -> Self {
        BookingError::NotFound { entity: "excursion", id }
    }

    pub fn subscription_not_found(id: Uuid) -> Self {
        BookingError::NotFound { entity: "subscription", id }
    }

    pub fn persistence<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        BookingError::Persistence(err.into())
    }

    /// The violation behind this error, if it is a business-rule rejection.
    pub fn violation(&self) -> Option<&BusinessRuleViolation> {
        match self {
            BookingError::BusinessRule(v) => Some(v),
            _ => None,
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
