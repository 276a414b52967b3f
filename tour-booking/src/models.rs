use serde::{Deserialize, Serialize};
use tour_catalog::Excursion;
use tour_core::PaymentStatus;
use tour_shared::{Masked, Timestamps};
use uuid::Uuid;

/// A client's seat on an excursion. Never deleted, only moved between payment states.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub excursion_id: Uuid,
    pub client_id: Uuid,
    pub amount_paid_cents: i64,
    pub payment_status: PaymentStatus,
    pub client_remarks: Option<Masked<String>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Subscription {
    /// The subscription created by a successful enrollment: PENDING, charged the current price.
    pub fn pending(excursion: &Excursion, client_id: Uuid, remarks: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            excursion_id: excursion.id,
            client_id,
            amount_paid_cents: excursion.price_cents,
            payment_status: PaymentStatus::Pending,
            client_remarks: remarks.map(Masked::new),
            timestamps: Timestamps::now(),
        }
    }

    pub fn set_payment_status(&mut self, status: PaymentStatus) {
        self.payment_status = status;
        self.timestamps.touch();
    }

    pub fn is_approved(&self) -> bool {
        self.payment_status == PaymentStatus::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tour_catalog::ExcursionDetails;

    #[test]
    fn test_pending_subscription_snapshots_price() {
        let excursion = Excursion::new(
            Uuid::new_v4(),
            ExcursionDetails {
                title: "Ilha Grande boat tour".to_string(),
                description: "Full day around the island beaches.".to_string(),
                departure_at: Utc::now() + Duration::days(10),
                return_at: None,
                price_cents: 25_000,
                total_seats: 12,
                departure_location: None,
                destination: None,
                notes: None,
                image_urls: vec![],
                accepts_pix: true,
                accepts_card: false,
            },
        )
        .unwrap();
        let client_id = Uuid::new_v4();

        let mut subscription =
            Subscription::pending(&excursion, client_id, Some("vegetarian lunch".to_string()));
        assert_eq!(subscription.amount_paid_cents, 25_000);
        assert_eq!(subscription.payment_status, PaymentStatus::Pending);
        assert_eq!(subscription.excursion_id, excursion.id);
        assert!(!format!("{:?}", subscription).contains("vegetarian"));

        subscription.set_payment_status(PaymentStatus::Approved);
        assert!(subscription.is_approved());
    }
}
