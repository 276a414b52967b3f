use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tour_catalog::Excursion;
use tour_core::{BookingError, BookingResult};

use crate::repository::SubscriptionStats;

/// Inclusive reporting window, resolved to UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportingPeriod {
    /// Missing bounds fall back to the calendar month containing `today`.
    pub fn resolve(
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        today: NaiveDate,
    ) -> BookingResult<Self> {
        let month_start = today.with_day(1).unwrap_or(today);
        let month_end = month_start
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(today);

        let from = from.unwrap_or(month_start);
        let to = to.unwrap_or(month_end);
        if from > to {
            return Err(BookingError::Validation(format!(
                "period start {} is after period end {}",
                from, to
            )));
        }

        Ok(Self {
            start: from.and_time(NaiveTime::MIN).and_utc(),
            end: to
                .and_hms_milli_opt(23, 59, 59, 999)
                .unwrap_or_else(|| to.and_time(NaiveTime::MIN))
                .and_utc(),
        })
    }
}

/// Organizer-facing summary of sales and occupancy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganizerDashboard {
    pub total_excursions: u64,
    pub active_excursions: u64,
    pub excursions_in_period: u64,
    pub approved_revenue_cents: i64,
    pub total_subscriptions: u64,
    pub pending_subscriptions: u64,
    pub approved_subscriptions: u64,
    pub unique_clients: u64,
    /// Mean occupancy of the excursions departing in the period, in `[0, 1]`.
    pub average_occupancy: f64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl OrganizerDashboard {
    pub fn build(
        period: ReportingPeriod,
        total_excursions: u64,
        active_excursions: u64,
        departing: &[Excursion],
        stats: SubscriptionStats,
    ) -> Self {
        let average_occupancy = if departing.is_empty() {
            0.0
        } else {
            departing.iter().map(Excursion::occupancy_rate).sum::<f64>() / departing.len() as f64
        };

        Self {
            total_excursions,
            active_excursions,
            excursions_in_period: departing.len() as u64,
            approved_revenue_cents: stats.approved_revenue_cents,
            total_subscriptions: stats.total,
            pending_subscriptions: stats.pending,
            approved_subscriptions: stats.approved,
            unique_clients: stats.unique_clients,
            average_occupancy,
            period_start: period.start,
            period_end: period.end,
        }
    }
}
