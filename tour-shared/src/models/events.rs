use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    EnrollmentConfirmation,
    PaymentConfirmation,
}

impl NotificationKind {
    /// Topic the notification is published on when a broker-backed sink is configured.
    pub fn topic(&self) -> &'static str {
        match self {
            NotificationKind::EnrollmentConfirmation => "notifications.enrollment",
            NotificationKind::PaymentConfirmation => "notifications.payment",
        }
    }
}

/// Everything a mail/push template needs, snapshotted when the booking operation commits.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub subscription_id: Uuid,
    pub excursion_id: Uuid,
    pub client_id: Uuid,
    pub excursion_title: String,
    pub departure_at: DateTime<Utc>,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&NotificationKind::PaymentConfirmation).unwrap();
        assert_eq!(json, "\"PAYMENT_CONFIRMATION\"");
        assert_eq!(NotificationKind::EnrollmentConfirmation.topic(), "notifications.enrollment");
    }
}
