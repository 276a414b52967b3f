use tour_core::{BookingError, BookingResult, BusinessRuleViolation};

use crate::excursion::Excursion;
use crate::status::ExcursionStatus;

/// Seat accounting for an excursion.
impl Excursion {
    pub fn available_seats(&self) -> i32 {
        self.total_seats - self.occupied_seats
    }

    pub fn has_available_seats(&self) -> bool {
        self.available_seats() > 0
    }

    /// Whether a new subscription could take a seat right now. A FULL excursion, or an
    /// ACTIVE one with nothing left, reports `Full`; any other status reports `NotActive`.
    pub fn check_admission(&self) -> Result<(), BusinessRuleViolation> {
        match self.status {
            ExcursionStatus::Full => Err(BusinessRuleViolation::Full),
            ExcursionStatus::Active if !self.has_available_seats() => {
                Err(BusinessRuleViolation::Full)
            }
            ExcursionStatus::Active => Ok(()),
            _ => Err(BusinessRuleViolation::NotActive),
        }
    }

    /// Take one seat for a new subscription. Taking the last seat turns the excursion FULL.
    pub fn reserve_seat(&mut self) -> Result<(), BusinessRuleViolation> {
        self.check_admission()?;

        self.occupied_seats += 1;
        if self.occupied_seats == self.total_seats {
            self.status = ExcursionStatus::Full;
            tracing::info!("Excursion {} is now FULL ({} seats)", self.id, self.total_seats);
        }
        self.timestamps.touch();
        Ok(())
    }

    /// Change the seat total. Never below what is already booked; a FULL excursion that
    /// gains seats reopens, an ACTIVE one shrunk to its bookings closes.
    pub fn resize(&mut self, new_total_seats: i32) -> BookingResult<()> {
        if new_total_seats < self.occupied_seats {
            return Err(BusinessRuleViolation::ShrinkBelowBookings {
                requested: new_total_seats,
                occupied: self.occupied_seats,
            }
            .into());
        }
        if new_total_seats < 1 {
            return Err(BookingError::Validation(
                "an excursion needs at least one seat".to_string(),
            ));
        }

        self.total_seats = new_total_seats;
        match self.status {
            ExcursionStatus::Full if self.occupied_seats < self.total_seats => {
                self.status = ExcursionStatus::Active;
            }
            ExcursionStatus::Active if self.occupied_seats == self.total_seats => {
                self.status = ExcursionStatus::Full;
            }
            _ => {}
        }
        self.timestamps.touch();
        Ok(())
    }

    pub fn ensure_removable(&self) -> Result<(), BusinessRuleViolation> {
        if self.occupied_seats > 0 {
            return Err(BusinessRuleViolation::HasActiveSubscriptions {
                occupied: self.occupied_seats,
            });
        }
        Ok(())
    }

    /// Fraction of seats taken, in `[0, 1]`.
    pub fn occupancy_rate(&self) -> f64 {
        if self.total_seats <= 0 {
            0.0
        } else {
            f64::from(self.occupied_seats) / f64::from(self.total_seats)
        }
    }
}
