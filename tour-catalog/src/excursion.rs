use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tour_core::{BookingError, BookingResult, BusinessRuleViolation};
use tour_shared::Timestamps;
use uuid::Uuid;

use crate::status::ExcursionStatus;

const TITLE_LEN: (usize, usize) = (5, 200);
const DESCRIPTION_LEN: (usize, usize) = (10, 2000);
const LOCATION_MAX_LEN: usize = 300;
const NOTES_MAX_LEN: usize = 2000;

/// A trip published by an organizer. Seat counters and status are only mutated through
/// the methods here and in `capacity`, so `occupied_seats <= total_seats` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Excursion {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub departure_location: Option<String>,
    pub destination: Option<String>,
    pub notes: Option<String>,
    pub image_urls: Vec<String>,
    pub departure_at: DateTime<Utc>,
    pub return_at: Option<DateTime<Utc>>,
    pub price_cents: i64,
    pub total_seats: i32,
    pub occupied_seats: i32,
    pub accepts_pix: bool,
    pub accepts_card: bool,
    pub status: ExcursionStatus,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Organizer-editable part of an excursion, as submitted on create/update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExcursionDetails {
    pub title: String,
    pub description: String,
    pub departure_at: DateTime<Utc>,
    #[serde(default)]
    pub return_at: Option<DateTime<Utc>>,
    pub price_cents: i64,
    pub total_seats: i32,
    #[serde(default)]
    pub departure_location: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default = "default_true")]
    pub accepts_pix: bool,
    #[serde(default = "default_true")]
    pub accepts_card: bool,
}

fn default_true() -> bool {
    true
}

impl ExcursionDetails {
    pub fn validate(&self, now: DateTime<Utc>) -> BookingResult<()> {
        check_len("title", &self.title, TITLE_LEN.0, TITLE_LEN.1)?;
        check_len("description", &self.description, DESCRIPTION_LEN.0, DESCRIPTION_LEN.1)?;

        if self.departure_at <= now {
            return Err(BookingError::Validation(
                "departure must be in the future".to_string(),
            ));
        }
        if let Some(return_at) = self.return_at {
            if return_at < self.departure_at {
                return Err(BookingError::Validation(
                    "return cannot be before departure".to_string(),
                ));
            }
        }
        if self.price_cents <= 0 {
            return Err(BookingError::Validation(
                "price must be greater than zero".to_string(),
            ));
        }
        if self.total_seats < 1 {
            return Err(BookingError::Validation(
                "an excursion needs at least one seat".to_string(),
            ));
        }

        for (field, value) in [
            ("departure_location", &self.departure_location),
            ("destination", &self.destination),
        ] {
            if let Some(v) = value {
                check_len(field, v, 0, LOCATION_MAX_LEN)?;
            }
        }
        if let Some(notes) = &self.notes {
            check_len("notes", notes, 0, NOTES_MAX_LEN)?;
        }

        Ok(())
    }
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> BookingResult<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(BookingError::Validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

impl Excursion {
    /// A new excursion always starts as an empty DRAFT.
    pub fn new(organizer_id: Uuid, details: ExcursionDetails) -> BookingResult<Self> {
        details.validate(Utc::now())?;

        Ok(Self {
            id: Uuid::new_v4(),
            organizer_id,
            title: details.title,
            description: details.description,
            departure_location: details.departure_location,
            destination: details.destination,
            notes: details.notes,
            image_urls: details.image_urls,
            departure_at: details.departure_at,
            return_at: details.return_at,
            price_cents: details.price_cents,
            total_seats: details.total_seats,
            occupied_seats: 0,
            accepts_pix: details.accepts_pix,
            accepts_card: details.accepts_card,
            status: ExcursionStatus::Draft,
            timestamps: Timestamps::now(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == ExcursionStatus::Active
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_owned_by(&self, organizer_id: Uuid) -> bool {
        self.organizer_id == organizer_id
    }

    /// Explicit status change requested by the organizer.
    ///
    /// Same-status requests are no-ops. Entering ACTIVE requires a future departure and a
    /// free seat; entering FULL requires every seat to be taken.
    pub fn transition_to(
        &mut self,
        target: ExcursionStatus,
        now: DateTime<Utc>,
    ) -> Result<(), BusinessRuleViolation> {
        if self.status == target {
            return Ok(());
        }

        if !self.status.can_transition_to(target) {
            return Err(self.invalid_transition(target));
        }

        match target {
            ExcursionStatus::Active => {
                if self.departure_at <= now {
                    return Err(BusinessRuleViolation::DepartureInPast);
                }
                if !self.has_available_seats() {
                    return Err(self.invalid_transition(target));
                }
            }
            ExcursionStatus::Full => {
                if self.has_available_seats() {
                    return Err(self.invalid_transition(target));
                }
            }
            _ => {}
        }

        tracing::debug!("Excursion {} status {} -> {}", self.id, self.status, target);
        self.status = target;
        self.timestamps.touch();
        Ok(())
    }

    /// Organizer edit. Capacity goes through `resize`, so the shrink rule and the
    /// ACTIVE/FULL derivation apply exactly as for a dedicated resize.
    pub fn apply_details(&mut self, details: ExcursionDetails) -> BookingResult<()> {
        details.validate(Utc::now())?;

        if details.total_seats != self.total_seats {
            self.resize(details.total_seats)?;
        }

        self.title = details.title;
        self.description = details.description;
        self.departure_location = details.departure_location;
        self.destination = details.destination;
        self.notes = details.notes;
        if !details.image_urls.is_empty() {
            self.image_urls = details.image_urls;
        }
        self.departure_at = details.departure_at;
        self.return_at = details.return_at;
        self.price_cents = details.price_cents;
        self.accepts_pix = details.accepts_pix;
        self.accepts_card = details.accepts_card;
        self.timestamps.touch();
        Ok(())
    }

    fn invalid_transition(&self, target: ExcursionStatus) -> BusinessRuleViolation {
        BusinessRuleViolation::InvalidTransition {
            from: self.status.to_string(),
            to: target.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn details(total_seats: i32) -> ExcursionDetails {
        ExcursionDetails {
            title: "Chapada Diamantina weekend".to_string(),
            description: "Three days of trails, waterfalls and caves.".to_string(),
            departure_at: Utc::now() + Duration::days(30),
            return_at: Some(Utc::now() + Duration::days(33)),
            price_cents: 89_900,
            total_seats,
            departure_location: Some("Salvador".to_string()),
            destination: Some("Lençóis".to_string()),
            notes: None,
            image_urls: vec![],
            accepts_pix: true,
            accepts_card: true,
        }
    }

    pub(crate) fn active(total_seats: i32) -> Excursion {
        let mut excursion = Excursion::new(Uuid::new_v4(), details(total_seats)).unwrap();
        excursion
            .transition_to(ExcursionStatus::Active, Utc::now())
            .unwrap();
        excursion
    }

    #[test]
    fn test_new_excursion_is_empty_draft() {
        let excursion = Excursion::new(Uuid::new_v4(), details(10)).unwrap();
        assert_eq!(excursion.status, ExcursionStatus::Draft);
        assert_eq!(excursion.occupied_seats, 0);
        assert_eq!(excursion.total_seats, 10);
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        let mut d = details(10);
        d.title = "Trip".to_string();
        assert!(matches!(Excursion::new(Uuid::new_v4(), d), Err(BookingError::Validation(_))));

        let mut d = details(0);
        d.title = "Valid title here".to_string();
        assert!(matches!(Excursion::new(Uuid::new_v4(), d), Err(BookingError::Validation(_))));

        let mut d = details(10);
        d.price_cents = 0;
        assert!(matches!(Excursion::new(Uuid::new_v4(), d), Err(BookingError::Validation(_))));

        let mut d = details(10);
        d.departure_at = Utc::now() - Duration::hours(1);
        assert!(matches!(Excursion::new(Uuid::new_v4(), d), Err(BookingError::Validation(_))));

        let mut d = details(10);
        d.return_at = Some(d.departure_at - Duration::days(1));
        assert!(matches!(Excursion::new(Uuid::new_v4(), d), Err(BookingError::Validation(_))));
    }

    #[test]
    fn test_activation_requires_future_departure() {
        let mut excursion = Excursion::new(Uuid::new_v4(), details(5)).unwrap();
        excursion.departure_at = Utc::now() - Duration::days(1);

        let result = excursion.transition_to(ExcursionStatus::Active, Utc::now());
        assert_eq!(result, Err(BusinessRuleViolation::DepartureInPast));
        assert_eq!(excursion.status, ExcursionStatus::Draft);
    }

    #[test]
    fn test_draft_cannot_finish() {
        let mut excursion = Excursion::new(Uuid::new_v4(), details(5)).unwrap();
        let result = excursion.transition_to(ExcursionStatus::Finished, Utc::now());
        assert!(matches!(result, Err(BusinessRuleViolation::InvalidTransition { .. })));
    }

    #[test]
    fn test_cancel_is_unrestricted_but_final() {
        let mut excursion = active(3);
        excursion.reserve_seat().unwrap();

        excursion.transition_to(ExcursionStatus::Cancelled, Utc::now()).unwrap();
        assert_eq!(excursion.status, ExcursionStatus::Cancelled);

        let result = excursion.transition_to(ExcursionStatus::Active, Utc::now());
        assert!(matches!(result, Err(BusinessRuleViolation::InvalidTransition { .. })));
    }

    #[test]
    fn test_explicit_full_requires_exhausted_seats() {
        let mut excursion = active(2);
        let result = excursion.transition_to(ExcursionStatus::Full, Utc::now());
        assert!(matches!(result, Err(BusinessRuleViolation::InvalidTransition { .. })));

        excursion.reserve_seat().unwrap();
        excursion.reserve_seat().unwrap();
        assert_eq!(excursion.status, ExcursionStatus::Full);

        // Reopening a FULL excursion needs a free seat first.
        let result = excursion.transition_to(ExcursionStatus::Active, Utc::now());
        assert!(matches!(result, Err(BusinessRuleViolation::InvalidTransition { .. })));
    }

    #[test]
    fn test_finish_from_full() {
        let mut excursion = active(1);
        excursion.reserve_seat().unwrap();
        excursion.transition_to(ExcursionStatus::Finished, Utc::now()).unwrap();
        assert!(excursion.is_terminal());
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut excursion = active(2);
        let updated_at = excursion.timestamps.updated_at;
        excursion.transition_to(ExcursionStatus::Active, Utc::now()).unwrap();
        assert_eq!(excursion.timestamps.updated_at, updated_at);
    }

    #[test]
    fn test_apply_details_shrink_rule() {
        let mut excursion = active(3);
        excursion.reserve_seat().unwrap();
        excursion.reserve_seat().unwrap();

        let result = excursion.apply_details(details(1));
        assert!(matches!(
            result,
            Err(BookingError::BusinessRule(BusinessRuleViolation::ShrinkBelowBookings { .. }))
        ));
        assert_eq!(excursion.total_seats, 3);

        let mut d = details(2);
        d.title = "Chapada Diamantina long weekend".to_string();
        excursion.apply_details(d).unwrap();
        assert_eq!(excursion.total_seats, 2);
        assert_eq!(excursion.status, ExcursionStatus::Full);
        assert_eq!(excursion.title, "Chapada Diamantina long weekend");
    }

    #[test]
    fn test_details_payload_defaults() {
        let payload = serde_json::json!({
            "title": "Jalapão expedition",
            "description": "Four days of dunes, fervedouros and waterfalls.",
            "departure_at": (Utc::now() + Duration::days(40)).to_rfc3339(),
            "price_cents": 320_000,
            "total_seats": 8
        });

        let d: ExcursionDetails = serde_json::from_value(payload).unwrap();
        assert!(d.accepts_pix);
        assert!(d.accepts_card);
        assert!(d.image_urls.is_empty());
        assert!(d.return_at.is_none());
        assert!(d.validate(Utc::now()).is_ok());
    }
}
