use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tour_booking::repository::{
    Admission, BookingStore, Enrollment, ExcursionUpdate, RemovalCheck, SubscriptionStats,
};
use tour_booking::Subscription;
use tour_catalog::{Excursion, ExcursionStatus};
use tour_core::{BookingError, BookingResult, BusinessRuleViolation, PaymentStatus};
use tour_shared::{Masked, Page, PageRequest, Timestamps};
use tracing::error;
use uuid::Uuid;

const EXCURSION_COLUMNS: &str = "id, organizer_id, title, description, departure_location, \
    destination, notes, image_urls, departure_at, return_at, price_cents, total_seats, \
    occupied_seats, accepts_pix, accepts_card, status, created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "id, excursion_id, client_id, amount_paid_cents, \
    payment_status, client_remarks, created_at, updated_at";

const UNIQUE_VIOLATION: &str = "23505";
const ENROLLMENT_KEY: &str = "subscriptions_client_excursion_key";

/// PostgreSQL-backed store. Atomic primitives lock the excursion row with
/// `SELECT ... FOR UPDATE` for the whole transaction.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_excursion(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> BookingResult<Excursion> {
        let row = sqlx::query_as::<_, ExcursionRow>(&format!(
            "SELECT {} FROM excursions WHERE id = $1 FOR UPDATE",
            EXCURSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;

        row.ok_or_else(|| BookingError::excursion_not_found(id))?
            .try_into()
    }

    async fn write_excursion(
        tx: &mut Transaction<'_, Postgres>,
        e: &Excursion,
    ) -> BookingResult<()> {
        sqlx::query(
            r#"
            UPDATE excursions
            SET title = $2, description = $3, departure_location = $4, destination = $5,
                notes = $6, image_urls = $7, departure_at = $8, return_at = $9,
                price_cents = $10, total_seats = $11, occupied_seats = $12,
                accepts_pix = $13, accepts_card = $14, status = $15, updated_at = $16
            WHERE id = $1
            "#,
        )
        .bind(e.id)
        .bind(&e.title)
        .bind(&e.description)
        .bind(&e.departure_location)
        .bind(&e.destination)
        .bind(&e.notes)
        .bind(&e.image_urls)
        .bind(e.departure_at)
        .bind(e.return_at)
        .bind(e.price_cents)
        .bind(e.total_seats)
        .bind(e.occupied_seats)
        .bind(e.accepts_pix)
        .bind(e.accepts_card)
        .bind(e.status.as_str())
        .bind(e.timestamps.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    fn excursion_page(
        rows: Vec<ExcursionRow>,
        total: i64,
        page: PageRequest,
    ) -> BookingResult<Page<Excursion>> {
        Ok(Page {
            items: rows
                .into_iter()
                .map(Excursion::try_from)
                .collect::<BookingResult<_>>()?,
            page: page.page,
            size: page.size,
            total: total as u64,
        })
    }

    async fn subscription_page(
        &self,
        column: &str,
        value: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>> {
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM subscriptions WHERE {} = $1",
            column
        ))
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE {} = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            SUBSCRIPTION_COLUMNS, column
        ))
        .bind(value)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(Subscription::try_from)
                .collect::<BookingResult<_>>()?,
            page: page.page,
            size: page.size,
            total: total as u64,
        })
    }
}

/// Only the (client, excursion) key means a second enrollment; other unique clashes are faults.
fn is_enrollment_conflict(code: Option<&str>, constraint: Option<&str>) -> bool {
    code == Some(UNIQUE_VIOLATION) && constraint == Some(ENROLLMENT_KEY)
}

fn db_error(err: sqlx::Error) -> BookingError {
    if let sqlx::Error::Database(db) = &err {
        if is_enrollment_conflict(db.code().as_deref(), db.constraint()) {
            return BusinessRuleViolation::Duplicate.into();
        }
    }
    error!("Database error: {}", err);
    BookingError::persistence(err)
}

#[derive(sqlx::FromRow)]
struct ExcursionRow {
    id: Uuid,
    organizer_id: Uuid,
    title: String,
    description: String,
    departure_location: Option<String>,
    destination: Option<String>,
    notes: Option<String>,
    image_urls: Vec<String>,
    departure_at: DateTime<Utc>,
    return_at: Option<DateTime<Utc>>,
    price_cents: i64,
    total_seats: i32,
    occupied_seats: i32,
    accepts_pix: bool,
    accepts_card: bool,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ExcursionRow> for Excursion {
    type Error = BookingError;

    fn try_from(row: ExcursionRow) -> Result<Self, Self::Error> {
        Ok(Excursion {
            id: row.id,
            organizer_id: row.organizer_id,
            title: row.title,
            description: row.description,
            departure_location: row.departure_location,
            destination: row.destination,
            notes: row.notes,
            image_urls: row.image_urls,
            departure_at: row.departure_at,
            return_at: row.return_at,
            price_cents: row.price_cents,
            total_seats: row.total_seats,
            occupied_seats: row.occupied_seats,
            accepts_pix: row.accepts_pix,
            accepts_card: row.accepts_card,
            status: row
                .status
                .parse::<ExcursionStatus>()
                .map_err(BookingError::persistence)?,
            timestamps: Timestamps {
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    excursion_id: Uuid,
    client_id: Uuid,
    amount_paid_cents: i64,
    payment_status: String,
    client_remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = BookingError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: row.id,
            excursion_id: row.excursion_id,
            client_id: row.client_id,
            amount_paid_cents: row.amount_paid_cents,
            payment_status: row
                .payment_status
                .parse::<PaymentStatus>()
                .map_err(BookingError::persistence)?,
            client_remarks: row.client_remarks.map(Masked::new),
            timestamps: Timestamps {
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total: i64,
    pending: i64,
    approved: i64,
    approved_revenue_cents: i64,
    unique_clients: i64,
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert_excursion(&self, e: &Excursion) -> BookingResult<()> {
        sqlx::query(&format!(
            "INSERT INTO excursions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18)",
            EXCURSION_COLUMNS
        ))
        .bind(e.id)
        .bind(e.organizer_id)
        .bind(&e.title)
        .bind(&e.description)
        .bind(&e.departure_location)
        .bind(&e.destination)
        .bind(&e.notes)
        .bind(&e.image_urls)
        .bind(e.departure_at)
        .bind(e.return_at)
        .bind(e.price_cents)
        .bind(e.total_seats)
        .bind(e.occupied_seats)
        .bind(e.accepts_pix)
        .bind(e.accepts_card)
        .bind(e.status.as_str())
        .bind(e.timestamps.created_at)
        .bind(e.timestamps.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_excursion(&self, id: Uuid) -> BookingResult<Option<Excursion>> {
        let row = sqlx::query_as::<_, ExcursionRow>(&format!(
            "SELECT {} FROM excursions WHERE id = $1",
            EXCURSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Excursion::try_from).transpose()
    }

    async fn list_excursions_by_organizer(
        &self,
        organizer_id: Uuid,
        status: Option<ExcursionStatus>,
        page: PageRequest,
    ) -> BookingResult<Page<Excursion>> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM excursions WHERE organizer_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(organizer_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let rows: Vec<ExcursionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM excursions WHERE organizer_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
            EXCURSION_COLUMNS
        ))
        .bind(organizer_id)
        .bind(status)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Self::excursion_page(rows, total, page)
    }

    async fn list_open_excursions(
        &self,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> BookingResult<Page<Excursion>> {
        let active = ExcursionStatus::Active.as_str();

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM excursions WHERE status = $1 AND departure_at > $2",
        )
        .bind(active)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let rows: Vec<ExcursionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM excursions WHERE status = $1 AND departure_at > $2 \
             ORDER BY departure_at ASC, id ASC LIMIT $3 OFFSET $4",
            EXCURSION_COLUMNS
        ))
        .bind(active)
        .bind(now)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Self::excursion_page(rows, total, page)
    }

    async fn list_excursions_departing_between(
        &self,
        organizer_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BookingResult<Vec<Excursion>> {
        let rows: Vec<ExcursionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM excursions WHERE organizer_id = $1 AND departure_at BETWEEN $2 AND $3 \
             ORDER BY departure_at ASC, id ASC",
            EXCURSION_COLUMNS
        ))
        .bind(organizer_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Excursion::try_from).collect()
    }

    async fn count_excursions(
        &self,
        organizer_id: Uuid,
        status: Option<ExcursionStatus>,
    ) -> BookingResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM excursions WHERE organizer_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(organizer_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(count as u64)
    }

    async fn update_excursion(
        &self,
        id: Uuid,
        apply: &ExcursionUpdate,
    ) -> BookingResult<Excursion> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut excursion = Self::lock_excursion(&mut tx, id).await?;

        // Dropping the transaction on error rolls it back and releases the lock
        apply(&mut excursion)?;
        Self::write_excursion(&mut tx, &excursion).await?;

        tx.commit().await.map_err(db_error)?;
        Ok(excursion)
    }

    async fn delete_excursion(&self, id: Uuid, check: &RemovalCheck) -> BookingResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let excursion = Self::lock_excursion(&mut tx, id).await?;
        check(&excursion)?;

        sqlx::query("DELETE FROM excursions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn enroll(
        &self,
        excursion_id: Uuid,
        client_id: Uuid,
        admit: &Admission,
    ) -> BookingResult<Enrollment> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut excursion = Self::lock_excursion(&mut tx, excursion_id).await?;

        let already_enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE client_id = $1 AND excursion_id = $2)",
        )
        .bind(client_id)
        .bind(excursion_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        let subscription = admit(&mut excursion, already_enrolled)?;

        sqlx::query(&format!(
            "INSERT INTO subscriptions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription.id)
        .bind(subscription.excursion_id)
        .bind(subscription.client_id)
        .bind(subscription.amount_paid_cents)
        .bind(subscription.payment_status.as_str())
        .bind(subscription.client_remarks.as_ref().map(|r| r.expose().as_str()))
        .bind(subscription.timestamps.created_at)
        .bind(subscription.timestamps.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        Self::write_excursion(&mut tx, &excursion).await?;
        tx.commit().await.map_err(db_error)?;

        Ok(Enrollment {
            excursion,
            subscription,
        })
    }

    async fn find_subscription(&self, id: Uuid) -> BookingResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Subscription::try_from).transpose()
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> BookingResult<Subscription> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "UPDATE subscriptions SET payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.ok_or_else(|| BookingError::subscription_not_found(id))?
            .try_into()
    }

    async fn list_subscriptions_by_client(
        &self,
        client_id: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>> {
        self.subscription_page("client_id", client_id, page).await
    }

    async fn list_subscriptions_by_excursion(
        &self,
        excursion_id: Uuid,
        page: PageRequest,
    ) -> BookingResult<Page<Subscription>> {
        self.subscription_page("excursion_id", excursion_id, page)
            .await
    }

    async fn subscription_stats(
        &self,
        organizer_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BookingResult<SubscriptionStats> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE s.payment_status = 'PENDING') AS pending,
                COUNT(*) FILTER (WHERE s.payment_status = 'APPROVED') AS approved,
                COALESCE(SUM(s.amount_paid_cents) FILTER (WHERE s.payment_status = 'APPROVED'), 0)::BIGINT
                    AS approved_revenue_cents,
                COUNT(DISTINCT s.client_id) AS unique_clients
            FROM subscriptions s
            JOIN excursions e ON e.id = s.excursion_id
            WHERE e.organizer_id = $1 AND s.created_at BETWEEN $2 AND $3
            "#,
        )
        .bind(organizer_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(SubscriptionStats {
            total: row.total as u64,
            pending: row.pending as u64,
            approved: row.approved as u64,
            approved_revenue_cents: row.approved_revenue_cents,
            unique_clients: row.unique_clients as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_only_enrollment_key_clash_is_duplicate() {
        assert!(is_enrollment_conflict(Some("23505"), Some("subscriptions_client_excursion_key")));
        assert!(!is_enrollment_conflict(Some("23505"), Some("excursions_pkey")));
        assert!(!is_enrollment_conflict(Some("23505"), None));
        assert!(!is_enrollment_conflict(Some("23514"), Some("subscriptions_client_excursion_key")));
    }

    fn row(status: &str) -> ExcursionRow {
        let now = Utc::now();
        ExcursionRow {
            id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            title: "Serra do Cipó waterfalls".to_string(),
            description: "Day trip with three waterfall stops.".to_string(),
            departure_location: None,
            destination: Some("Serra do Cipó".to_string()),
            notes: None,
            image_urls: vec!["excursions/cipo.jpg".to_string()],
            departure_at: now + Duration::days(3),
            return_at: None,
            price_cents: 19_900,
            total_seats: 15,
            occupied_seats: 4,
            accepts_pix: true,
            accepts_card: false,
            status: status.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_excursion_row_maps_status() {
        let excursion = Excursion::try_from(row("FULL")).unwrap();
        assert_eq!(excursion.status, ExcursionStatus::Full);
        assert_eq!(excursion.available_seats(), 11);
    }

    #[test]
    fn test_unknown_status_is_persistence_error() {
        let result = Excursion::try_from(row("ARCHIVED"));
        assert!(matches!(result, Err(BookingError::Persistence(_))));
    }

    #[test]
    fn test_subscription_row_masks_remarks() {
        let now = Utc::now();
        let subscription = Subscription::try_from(SubscriptionRow {
            id: Uuid::new_v4(),
            excursion_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            amount_paid_cents: 19_900,
            payment_status: "APPROVED".to_string(),
            client_remarks: Some("allergic to peanuts".to_string()),
            created_at: now,
            updated_at: now,
        })
        .unwrap();

        assert!(subscription.is_approved());
        assert!(!format!("{:?}", subscription).contains("peanuts"));
    }
}
