use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};
use crate::store::SchedulingStore;

/// Longest appointment the engine accepts; bounds the overlap lookback window.
pub const MAX_DURATION_MINUTES: i64 = 240;

pub const DEFAULT_DURATION_MINUTES: i32 = 12;

/// Half-open intervals `[s1, s1+d1)` and `[s2, s2+d2)` intersect.
pub fn intervals_overlap(s1: NaiveDateTime, d1: i32, s2: NaiveDateTime, d2: i32) -> bool {
    s1 < s2 + Duration::minutes(d2 as i64) && s2 < s1 + Duration::minutes(d1 as i64)
}

/// First active appointment overlapping the candidate interval, skipping `exclude`.
pub fn find_overlap<'a, I>(
    appointments: I,
    start: NaiveDateTime,
    duration_minutes: i32,
    exclude: Option<Uuid>,
) -> Option<&'a Appointment>
where
    I: IntoIterator<Item = &'a Appointment>,
{
    appointments.into_iter().find(|a| {
        a.is_active()
            && Some(a.id) != exclude
            && intervals_overlap(a.appointment_time, a.duration_minutes, start, duration_minutes)
    })
}

pub struct AvailabilityChecker {
    store: Arc<dyn SchedulingStore>,
}

impl AvailabilityChecker {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Whether the doctor is free for `[start, start+duration)`. This is a
    /// fast pre-check; the store repeats it inside the committing operation.
    pub async fn is_available(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        duration_minutes: Option<i32>,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        let duration = duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        let from = start - Duration::minutes(MAX_DURATION_MINUTES);
        let to = start + Duration::minutes(duration as i64);

        let candidates = self.store.active_appointments_between(doctor_id, from, to).await?;
        let clash = find_overlap(&candidates, start, duration, exclude);

        if let Some(existing) = clash {
            debug!(
                "Doctor {} busy at {}: overlaps {} ({})",
                doctor_id, start, existing.booking_number, existing.appointment_time
            );
        }

        Ok(clash.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn adjacent_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(9, 0), 12, at(9, 12), 12));
        assert!(!intervals_overlap(at(9, 12), 12, at(9, 0), 12));
    }

    #[test]
    fn partial_and_containing_intervals_overlap() {
        assert!(intervals_overlap(at(9, 0), 12, at(9, 5), 12));
        assert!(intervals_overlap(at(9, 0), 60, at(9, 20), 5));
        assert!(intervals_overlap(at(9, 20), 5, at(9, 0), 60));
        assert!(intervals_overlap(at(9, 0), 12, at(9, 0), 12));
    }
}
