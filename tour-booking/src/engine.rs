use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tour_catalog::{Excursion, ExcursionDetails, ExcursionStatus};
use tour_core::{BookingError, BookingResult, BusinessRuleViolation, PaymentStatus};
use tour_shared::models::events::NotificationKind;
use tour_shared::{Page, PageRequest};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatcher::{notification, NotificationQueue};
use crate::finance::{OrganizerDashboard, ReportingPeriod};
use crate::models::Subscription;
use crate::repository::BookingStore;

/// Owns the excursion and subscription lifecycle: admission control, seat accounting
/// and status derivation. Every mutation goes through one of the store's atomic
/// primitives; notifications are enqueued only after the store has committed.
#[derive(Clone)]
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    notifications: NotificationQueue,
}

fn owned_or_not_found(excursion: &Excursion, organizer_id: Uuid) -> BookingResult<()> {
    if excursion.is_owned_by(organizer_id) {
        Ok(())
    } else {
        Err(BookingError::excursion_not_found(excursion.id))
    }
}

impl BookingEngine {
    pub fn new(store: Arc<dyn BookingStore>, notifications: NotificationQueue) -> Self {
        Self {
            store,
            notifications,
        }
    }

    pub async fn create_excursion(
        &self,
        organizer_id: Uuid,
        details: ExcursionDetails,
    ) -> BookingResult<Excursion> {
        let excursion = Excursion::new(organizer_id, details)?;
        self.store.insert_excursion(&excursion).await?;
        info!("Organizer {} created excursion {}", organizer_id, excursion.id);
        Ok(excursion)
    }

    pub async fn update_excursion(
        &self,
        organizer_id: Uuid,
        excursion_id: Uuid,
        details: ExcursionDetails,
    ) -> BookingResult<Excursion> {
        let apply = move |excursion: &mut Excursion| -> BookingResult<()> {
            owned_or_not_found(excursion, organizer_id)?;
            excursion.apply_details(details.clone())
        };
        self.store.update_excursion(excursion_id, &apply).await
    }

    pub async fn get_organizer_excursion(
        &self,
        organizer_id: Uuid,
        excursion_id: Uuid,
    ) -> BookingResult<Excursion> {
        let excursion = self.load_excursion(excursion_id).await?;
        owned_or_not_found(&excursion, organizer_id)?;
        Ok(excursion)
    }

    pub async fn list_organizer_excursions(
        &self,
        organizer_id: Uuid,
        status: Option<ExcursionStatus>,
        page: PageRequest,
    ) -> BookingResult<Page<Excursion>> {
        self.store
            .list_excursions_by_organizer(organizer_id, status, page.clamped())
            .await
    }

    /// Public detail view. Only ACTIVE excursions are visible to clients.
    pub async fn get_public_excursion(&self, excursion_id: Uuid) -> BookingResult<Excursion> {
        let excursion = self.load_excursion(excursion_id).await?;
        if !excursion.is_active() {
            return Err(BusinessRuleViolation::NotActive.into());
        }
        Ok(excursion)
    }

    pub async fn list_open_excursions(&self, page: PageRequest) -> BookingResult<Page<Excursion>> {
        self.store
            .list_open_excursions(Utc::now(), page.clamped())
            .await
    }

    /// Admit `client_id` to the excursion. Checks run in order: open for booking
    /// (FULL answers `Full`, other non-ACTIVE statuses `NotActive`), not already enrolled. The confirmation notification is best-effort.
    pub async fn enroll(
        &self,
        excursion_id: Uuid,
        client_id: Uuid,
        remarks: Option<String>,
    ) -> BookingResult<Subscription> {
        let admit = move |excursion: &mut Excursion,
                          already_enrolled: bool|
              -> BookingResult<Subscription> {
            excursion.check_admission()?;
            if already_enrolled {
                return Err(BusinessRuleViolation::Duplicate.into());
            }
            excursion.reserve_seat()?;
            Ok(Subscription::pending(excursion, client_id, remarks.clone()))
        };

        let enrollment = self.store.enroll(excursion_id, client_id, &admit).await?;
        info!(
            "Client {} enrolled in excursion {} ({}/{} seats)",
            client_id,
            excursion_id,
            enrollment.excursion.occupied_seats,
            enrollment.excursion.total_seats
        );

        self.notifications.enqueue(notification(
            NotificationKind::EnrollmentConfirmation,
            &enrollment.excursion,
            &enrollment.subscription,
        ));
        Ok(enrollment.subscription)
    }

    pub async fn change_excursion_status(
        &self,
        organizer_id: Uuid,
        excursion_id: Uuid,
        status: ExcursionStatus,
    ) -> BookingResult<Excursion> {
        let apply = move |excursion: &mut Excursion| -> BookingResult<()> {
            owned_or_not_found(excursion, organizer_id)?;
            excursion.transition_to(status, Utc::now())?;
            Ok(())
        };
        let excursion = self.store.update_excursion(excursion_id, &apply).await?;
        info!("Excursion {} is now {}", excursion.id, excursion.status);
        Ok(excursion)
    }

    pub async fn resize_capacity(
        &self,
        organizer_id: Uuid,
        excursion_id: Uuid,
        total_seats: i32,
    ) -> BookingResult<Excursion> {
        let apply = move |excursion: &mut Excursion| -> BookingResult<()> {
            owned_or_not_found(excursion, organizer_id)?;
            excursion.resize(total_seats)
        };
        let excursion = self.store.update_excursion(excursion_id, &apply).await?;
        info!(
            "Excursion {} resized to {} seats ({} occupied, {})",
            excursion.id, excursion.total_seats, excursion.occupied_seats, excursion.status
        );
        Ok(excursion)
    }

    /// Delete an excursion nobody is booked on.
    pub async fn cancel_excursion(&self, organizer_id: Uuid, excursion_id: Uuid) -> BookingResult<()> {
        let check = move |excursion: &Excursion| -> BookingResult<()> {
            owned_or_not_found(excursion, organizer_id)?;
            excursion.ensure_removable()?;
            Ok(())
        };
        self.store.delete_excursion(excursion_id, &check).await?;
        info!("Excursion {} removed by organizer {}", excursion_id, organizer_id);
        Ok(())
    }

    /// Payment gateway callback. Seats stay reserved whatever the outcome.
    pub async fn record_payment_outcome(
        &self,
        subscription_id: Uuid,
        status: PaymentStatus,
    ) -> BookingResult<Subscription> {
        let subscription = self
            .store
            .update_payment_status(subscription_id, status)
            .await?;
        info!("Subscription {} payment is now {}", subscription.id, status);

        if subscription.is_approved() {
            match self.store.find_excursion(subscription.excursion_id).await {
                Ok(Some(excursion)) => self.notifications.enqueue(notification(
                    NotificationKind::PaymentConfirmation,
                    &excursion,
                    &subscription,
                )),
                Ok(None) => warn!(
                    "Excursion {} vanished, skipping payment confirmation for {}",
                    subscription.excursion_id, subscription.id
                ),
                Err(e) => warn!(
                    "Could not load excursion for payment confirmation of {}: {}",
                    subscription.id, e
                ),
            }
        }
        Ok(subscription)
    }

    pub async fn list_client_subscriptions(
        &self,
        client_id: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>> {
        self.store
            .list_subscriptions_by_client(client_id, page.clamped())
            .await
    }

    pub async fn get_client_subscription(
        &self,
        client_id: Uuid,
        subscription_id: Uuid,
    ) -> BookingResult<Subscription> {
        match self.store.find_subscription(subscription_id).await? {
            Some(subscription) if subscription.client_id == client_id => Ok(subscription),
            _ => Err(BookingError::subscription_not_found(subscription_id)),
        }
    }

    pub async fn list_excursion_subscriptions(
        &self,
        organizer_id: Uuid,
        excursion_id: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>> {
        self.get_organizer_excursion(organizer_id, excursion_id)
            .await?;
        self.store
            .list_subscriptions_by_excursion(excursion_id, page.clamped())
            .await
    }

    pub async fn organizer_dashboard(
        &self,
        organizer_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> BookingResult<OrganizerDashboard> {
        let period = ReportingPeriod::resolve(from, to, Utc::now().date_naive())?;

        let total = self.store.count_excursions(organizer_id, None).await?;
        let active = self
            .store
            .count_excursions(organizer_id, Some(ExcursionStatus::Active))
            .await?;
        let departing = self
            .store
            .list_excursions_departing_between(organizer_id, period.start, period.end)
            .await?;
        let stats = self
            .store
            .subscription_stats(organizer_id, period.start, period.end)
            .await?;

        Ok(OrganizerDashboard::build(period, total, active, &departing, stats))
    }

    async fn load_excursion(&self, excursion_id: Uuid) -> BookingResult<Excursion> {
        self.store
            .find_excursion(excursion_id)
            .await?
            .ok_or_else(|| BookingError::excursion_not_found(excursion_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBookingStore;
    use chrono::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tour_shared::models::events::Notification;

    fn details(total_seats: i32) -> ExcursionDetails {
        ExcursionDetails {
            title: "Lençóis Maranhenses dunes".to_string(),
            description: "Two days walking the dunes and lagoons.".to_string(),
            departure_at: Utc::now() + Duration::days(20),
            return_at: Some(Utc::now() + Duration::days(22)),
            price_cents: 89_900,
            total_seats,
            departure_location: Some("São Luís".to_string()),
            destination: Some("Barreirinhas".to_string()),
            notes: None,
            image_urls: vec![],
            accepts_pix: true,
            accepts_card: true,
        }
    }

    fn engine() -> (BookingEngine, UnboundedReceiver<Notification>) {
        let (queue, rx) = NotificationQueue::channel();
        (
            BookingEngine::new(Arc::new(InMemoryBookingStore::new()), queue),
            rx,
        )
    }

    async fn active_excursion(engine: &BookingEngine, organizer_id: Uuid, seats: i32) -> Excursion {
        let excursion = engine
            .create_excursion(organizer_id, details(seats))
            .await
            .unwrap();
        engine
            .change_excursion_status(organizer_id, excursion.id, ExcursionStatus::Active)
            .await
            .unwrap()
    }

    fn violation<T: std::fmt::Debug>(result: BookingResult<T>) -> BusinessRuleViolation {
        result.unwrap_err().violation().cloned().expect("business rule violation")
    }

    #[tokio::test]
    async fn test_enroll_in_draft_is_not_active() {
        let (engine, _rx) = engine();
        let organizer = Uuid::new_v4();
        let excursion = engine.create_excursion(organizer, details(3)).await.unwrap();

        let result = engine.enroll(excursion.id, Uuid::new_v4(), None).await;
        assert_eq!(violation(result), BusinessRuleViolation::NotActive);
    }

    #[tokio::test]
    async fn test_enroll_enqueues_confirmation() {
        let (engine, mut rx) = engine();
        let organizer = Uuid::new_v4();
        let excursion = active_excursion(&engine, organizer, 3).await;
        let client = Uuid::new_v4();

        let subscription = engine
            .enroll(excursion.id, client, Some("window seat".to_string()))
            .await
            .unwrap();
        assert_eq!(subscription.payment_status, PaymentStatus::Pending);
        assert_eq!(subscription.amount_paid_cents, 89_900);

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.kind, NotificationKind::EnrollmentConfirmation);
        assert_eq!(sent.subscription_id, subscription.id);
        assert_eq!(sent.client_id, client);
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_leaves_counter_alone() {
        let (engine, _rx) = engine();
        let organizer = Uuid::new_v4();
        let excursion = active_excursion(&engine, organizer, 3).await;
        let client = Uuid::new_v4();

        engine.enroll(excursion.id, client, None).await.unwrap();
        let result = engine.enroll(excursion.id, client, None).await;
        assert_eq!(violation(result), BusinessRuleViolation::Duplicate);

        let reloaded = engine
            .get_organizer_excursion(organizer, excursion.id)
            .await
            .unwrap();
        assert_eq!(reloaded.occupied_seats, 1);
    }

    #[tokio::test]
    async fn test_foreign_organizer_sees_not_found() {
        let (engine, _rx) = engine();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let excursion = active_excursion(&engine, owner, 3).await;

        let result = engine
            .resize_capacity(intruder, excursion.id, 10)
            .await;
        assert!(matches!(result, Err(BookingError::NotFound { .. })));

        let result = engine.cancel_excursion(intruder, excursion.id).await;
        assert!(matches!(result, Err(BookingError::NotFound { .. })));

        let untouched = engine.get_organizer_excursion(owner, excursion.id).await.unwrap();
        assert_eq!(untouched.total_seats, 3);
    }

    #[tokio::test]
    async fn test_payment_confirmation_only_when_approved() {
        let (engine, mut rx) = engine();
        let organizer = Uuid::new_v4();
        let excursion = active_excursion(&engine, organizer, 2).await;
        let subscription = engine
            .enroll(excursion.id, Uuid::new_v4(), None)
            .await
            .unwrap();
        rx.try_recv().unwrap();

        engine
            .record_payment_outcome(subscription.id, PaymentStatus::Rejected)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        let approved = engine
            .record_payment_outcome(subscription.id, PaymentStatus::Approved)
            .await
            .unwrap();
        assert!(approved.is_approved());
        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.kind, NotificationKind::PaymentConfirmation);
        assert_eq!(sent.excursion_title, excursion.title);

        // Rejected or approved, the seat stays taken
        let reloaded = engine.get_organizer_excursion(organizer, excursion.id).await.unwrap();
        assert_eq!(reloaded.occupied_seats, 1);
    }

    #[tokio::test]
    async fn test_payment_outcome_for_unknown_subscription() {
        let (engine, _rx) = engine();
        let result = engine
            .record_payment_outcome(Uuid::new_v4(), PaymentStatus::Approved)
            .await;
        assert!(matches!(result, Err(BookingError::NotFound { entity: "subscription", .. })));
    }

    #[tokio::test]
    async fn test_public_view_hides_drafts() {
        let (engine, _rx) = engine();
        let organizer = Uuid::new_v4();
        let draft = engine.create_excursion(organizer, details(3)).await.unwrap();
        assert_eq!(
            violation(engine.get_public_excursion(draft.id).await),
            BusinessRuleViolation::NotActive
        );

        let open = active_excursion(&engine, organizer, 3).await;
        assert_eq!(engine.get_public_excursion(open.id).await.unwrap().id, open.id);

        let listed = engine.list_open_excursions(PageRequest::default()).await.unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].id, open.id);
    }

    #[tokio::test]
    async fn test_client_cannot_read_someone_elses_subscription() {
        let (engine, _rx) = engine();
        let excursion = active_excursion(&engine, Uuid::new_v4(), 3).await;
        let owner = Uuid::new_v4();
        let subscription = engine.enroll(excursion.id, owner, None).await.unwrap();

        assert!(engine.get_client_subscription(owner, subscription.id).await.is_ok());
        let result = engine
            .get_client_subscription(Uuid::new_v4(), subscription.id)
            .await;
        assert!(matches!(result, Err(BookingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_goes_through_resize_rules() {
        let (engine, _rx) = engine();
        let organizer = Uuid::new_v4();
        let excursion = active_excursion(&engine, organizer, 3).await;
        engine.enroll(excursion.id, Uuid::new_v4(), None).await.unwrap();
        engine.enroll(excursion.id, Uuid::new_v4(), None).await.unwrap();

        let result = engine
            .update_excursion(organizer, excursion.id, details(1))
            .await;
        assert!(matches!(
            violation(result),
            BusinessRuleViolation::ShrinkBelowBookings { requested: 1, occupied: 2 }
        ));

        let mut edited = details(2);
        edited.title = "Lençóis Maranhenses by jeep".to_string();
        let updated = engine
            .update_excursion(organizer, excursion.id, edited)
            .await
            .unwrap();
        assert_eq!(updated.title, "Lençóis Maranhenses by jeep");
        assert_eq!(updated.status, ExcursionStatus::Full);
    }

    #[tokio::test]
    async fn test_dashboard_counts_current_month() {
        let (engine, _rx) = engine();
        let organizer = Uuid::new_v4();
        let excursion = active_excursion(&engine, organizer, 4).await;
        engine.create_excursion(organizer, details(2)).await.unwrap();

        let paid = engine.enroll(excursion.id, Uuid::new_v4(), None).await.unwrap();
        engine.enroll(excursion.id, Uuid::new_v4(), None).await.unwrap();
        engine
            .record_payment_outcome(paid.id, PaymentStatus::Approved)
            .await
            .unwrap();

        let dashboard = engine.organizer_dashboard(organizer, None, None).await.unwrap();
        assert_eq!(dashboard.total_excursions, 2);
        assert_eq!(dashboard.active_excursions, 1);
        assert_eq!(dashboard.total_subscriptions, 2);
        assert_eq!(dashboard.pending_subscriptions, 1);
        assert_eq!(dashboard.approved_subscriptions, 1);
        assert_eq!(dashboard.approved_revenue_cents, 89_900);
        assert_eq!(dashboard.unique_clients, 2);
    }
}
