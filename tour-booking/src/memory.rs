use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tour_catalog::{Excursion, ExcursionStatus};
use tour_core::{BookingError, BookingResult, BusinessRuleViolation, PaymentStatus};
use tour_shared::{Page, PageRequest};
use uuid::Uuid;

use crate::models::Subscription;
use crate::repository::{
    Admission, BookingStore, Enrollment, ExcursionUpdate, RemovalCheck, SubscriptionStats,
};

#[derive(Default)]
struct Tables {
    excursions: HashMap<Uuid, Excursion>,
    subscriptions: HashMap<Uuid, Subscription>,
    /// (client_id, excursion_id) uniqueness index.
    enrollments: HashSet<(Uuid, Uuid)>,
}

/// Process-local store. One mutex guards every table, which makes each trait call a
/// serializable transaction.
#[derive(Default)]
pub struct InMemoryBookingStore {
    tables: Mutex<Tables>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert_excursion(&self, excursion: &Excursion) -> BookingResult<()> {
        let mut tables = self.tables.lock().await;
        tables.excursions.insert(excursion.id, excursion.clone());
        Ok(())
    }

    async fn find_excursion(&self, id: Uuid) -> BookingResult<Option<Excursion>> {
        let tables = self.tables.lock().await;
        Ok(tables.excursions.get(&id).cloned())
    }

    async fn list_excursions_by_organizer(
        &self,
        organizer_id: Uuid,
        status: Option<ExcursionStatus>,
        page: PageRequest,
    ) -> BookingResult<Page<Excursion>> {
        let tables = self.tables.lock().await;
        let mut matching: Vec<Excursion> = tables
            .excursions
            .values()
            .filter(|e| e.organizer_id == organizer_id)
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        newest_first(&mut matching, |e| (e.timestamps.created_at, e.id));
        Ok(page.paginate(&matching))
    }

    async fn list_open_excursions(
        &self,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> BookingResult<Page<Excursion>> {
        let tables = self.tables.lock().await;
        let mut open: Vec<Excursion> = tables
            .excursions
            .values()
            .filter(|e| e.is_active() && e.departure_at > now)
            .cloned()
            .collect();
        open.sort_by_key(|e| (e.departure_at, e.id));
        Ok(page.paginate(&open))
    }

    async fn list_excursions_departing_between(
        &self,
        organizer_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BookingResult<Vec<Excursion>> {
        let tables = self.tables.lock().await;
        let mut departing: Vec<Excursion> = tables
            .excursions
            .values()
            .filter(|e| e.organizer_id == organizer_id)
            .filter(|e| e.departure_at >= from && e.departure_at <= to)
            .cloned()
            .collect();
        departing.sort_by_key(|e| (e.departure_at, e.id));
        Ok(departing)
    }

    async fn count_excursions(
        &self,
        organizer_id: Uuid,
        status: Option<ExcursionStatus>,
    ) -> BookingResult<u64> {
        let tables = self.tables.lock().await;
        let count = tables
            .excursions
            .values()
            .filter(|e| e.organizer_id == organizer_id)
            .filter(|e| status.map_or(true, |s| e.status == s))
            .count();
        Ok(count as u64)
    }

    async fn update_excursion(
        &self,
        id: Uuid,
        apply: &ExcursionUpdate,
    ) -> BookingResult<Excursion> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .excursions
            .get_mut(&id)
            .ok_or_else(|| BookingError::excursion_not_found(id))?;

        let mut working = stored.clone();
        apply(&mut working)?;
        *stored = working.clone();
        Ok(working)
    }

    async fn delete_excursion(&self, id: Uuid, check: &RemovalCheck) -> BookingResult<()> {
        let mut tables = self.tables.lock().await;
        let excursion = tables
            .excursions
            .get(&id)
            .ok_or_else(|| BookingError::excursion_not_found(id))?;

        check(excursion)?;
        tables.excursions.remove(&id);
        Ok(())
    }

    async fn enroll(
        &self,
        excursion_id: Uuid,
        client_id: Uuid,
        admit: &Admission,
    ) -> BookingResult<Enrollment> {
        let mut tables = self.tables.lock().await;
        let mut excursion = tables
            .excursions
            .get(&excursion_id)
            .cloned()
            .ok_or_else(|| BookingError::excursion_not_found(excursion_id))?;

        let already_enrolled = tables.enrollments.contains(&(client_id, excursion_id));
        let subscription = admit(&mut excursion, already_enrolled)?;

        if !tables.enrollments.insert((client_id, excursion_id)) {
            return Err(BusinessRuleViolation::Duplicate.into());
        }
        tables
            .subscriptions
            .insert(subscription.id, subscription.clone());
        tables.excursions.insert(excursion.id, excursion.clone());

        Ok(Enrollment {
            excursion,
            subscription,
        })
    }

    async fn find_subscription(&self, id: Uuid) -> BookingResult<Option<Subscription>> {
        let tables = self.tables.lock().await;
        Ok(tables.subscriptions.get(&id).cloned())
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> BookingResult<Subscription> {
        let mut tables = self.tables.lock().await;
        let subscription = tables
            .subscriptions
            .get_mut(&id)
            .ok_or_else(|| BookingError::subscription_not_found(id))?;
        subscription.set_payment_status(status);
        Ok(subscription.clone())
    }

    async fn list_subscriptions_by_client(
        &self,
        client_id: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>> {
        let tables = self.tables.lock().await;
        let mut matching: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect();
        newest_first(&mut matching, |s| (s.timestamps.created_at, s.id));
        Ok(page.paginate(&matching))
    }

    async fn list_subscriptions_by_excursion(
        &self,
        excursion_id: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>> {
        let tables = self.tables.lock().await;
        let mut matching: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.excursion_id == excursion_id)
            .cloned()
            .collect();
        newest_first(&mut matching, |s| (s.timestamps.created_at, s.id));
        Ok(page.paginate(&matching))
    }

    async fn subscription_stats(
        &self,
        organizer_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BookingResult<SubscriptionStats> {
        let tables = self.tables.lock().await;
        let mut stats = SubscriptionStats::default();
        let mut clients = HashSet::new();

        let in_scope = tables.subscriptions.values().filter(|s| {
            let created = s.timestamps.created_at;
            created >= from
                && created <= to
                && tables
                    .excursions
                    .get(&s.excursion_id)
                    .is_some_and(|e| e.organizer_id == organizer_id)
        });

        for subscription in in_scope {
            stats.total += 1;
            clients.insert(subscription.client_id);
            match subscription.payment_status {
                PaymentStatus::Pending => stats.pending += 1,
                PaymentStatus::Approved => {
                    stats.approved += 1;
                    stats.approved_revenue_cents += subscription.amount_paid_cents;
                }
                _ => {}
            }
        }
        stats.unique_clients = clients.len() as u64;
        Ok(stats)
    }
}
