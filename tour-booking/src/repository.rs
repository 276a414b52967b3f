use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tour_catalog::{Excursion, ExcursionStatus};
use tour_core::{BookingResult, PaymentStatus};
use tour_shared::{Page, PageRequest};
use uuid::Uuid;

use crate::models::Subscription;

/// Admission rule run inside the store's enrollment critical section. Receives the locked
/// excursion and whether the client already holds a subscription for it.
pub type Admission = dyn Fn(&mut Excursion, bool) -> BookingResult<Subscription> + Send + Sync;

/// Mutation run against a locked excursion. An error leaves the stored row untouched.
pub type ExcursionUpdate = dyn Fn(&mut Excursion) -> BookingResult<()> + Send + Sync;

/// Guard evaluated against a locked excursion before it is deleted.
pub type RemovalCheck = dyn Fn(&Excursion) -> BookingResult<()> + Send + Sync;

/// Result of an admitted enrollment, both rows as committed.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub excursion: Excursion,
    pub subscription: Subscription,
}

/// Subscription aggregates over one organizer's excursions, for subscriptions created in a period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub approved_revenue_cents: i64,
    pub unique_clients: u64,
}

/// Persistence port of the booking engine.
///
/// `enroll`, `update_excursion` and `delete_excursion` are atomic: the excursion is locked
/// (row lock or in-process mutex) for the whole read-check-write, so concurrent callers
/// are serialized per excursion and can never oversell.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_excursion(&self, excursion: &Excursion) -> BookingResult<()>;

    async fn find_excursion(&self, id: Uuid) -> BookingResult<Option<Excursion>>;

    async fn list_excursions_by_organizer(
        &self,
        organizer_id: Uuid,
        status: Option<ExcursionStatus>,
        page: PageRequest,
    ) -> BookingResult<Page<Excursion>>;

    /// ACTIVE excursions departing after `now`, soonest first.
    async fn list_open_excursions(
        &self,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> BookingResult<Page<Excursion>>;

    async fn list_excursions_departing_between(
        &self,
        organizer_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BookingResult<Vec<Excursion>>;

    async fn count_excursions(
        &self,
        organizer_id: Uuid,
        status: Option<ExcursionStatus>,
    ) -> BookingResult<u64>;

    async fn update_excursion(
        &self,
        id: Uuid,
        apply: &ExcursionUpdate,
    ) -> BookingResult<Excursion>;

    async fn delete_excursion(&self, id: Uuid, check: &RemovalCheck) -> BookingResult<()>;

    async fn enroll(
        &self,
        excursion_id: Uuid,
        client_id: Uuid,
        admit: &Admission,
    ) -> BookingResult<Enrollment>;

    async fn find_subscription(&self, id: Uuid) -> BookingResult<Option<Subscription>>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> BookingResult<Subscription>;

    async fn list_subscriptions_by_client(
        &self,
        client_id: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>>;

    async fn list_subscriptions_by_excursion(
        &self,
        excursion_id: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>>;

    async fn subscription_stats(
        &self,
        organizer_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BookingResult<SubscriptionStats>;
}
