use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    DoctorError, DoctorSchedule, NewScheduleRequest, DEFAULT_SLOT_MINUTES, MAX_SLOT_MINUTES,
    MIN_SLOT_MINUTES,
};

/// Read-only view of doctors' weekly open hours.
#[async_trait]
pub trait ScheduleCatalog: Send + Sync {
    /// Active schedule rows of the doctor for a weekday, ordered by start time.
    async fn schedules_for_day(&self, doctor_id: Uuid, day_of_week: u32) -> Result<Vec<DoctorSchedule>, DoctorError>;
}

pub struct SupabaseScheduleCatalog {
    supabase: SupabaseClient,
}

impl SupabaseScheduleCatalog {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl ScheduleCatalog for SupabaseScheduleCatalog {
    async fn schedules_for_day(&self, doctor_id: Uuid, day_of_week: u32) -> Result<Vec<DoctorSchedule>, DoctorError> {
        debug!("Fetching schedules for doctor {} on day {}", doctor_id, day_of_week);
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&order=start_time.asc",
            doctor_id, day_of_week
        );
        let rows: Vec<DoctorSchedule> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows)
    }
}

/// Check a prospective schedule row against the doctor's existing rows.
/// Returns the slot duration to store.
pub fn validate_new_schedule(existing: &[DoctorSchedule], candidate: &NewScheduleRequest) -> Result<i32, DoctorError> {
    if candidate.start_time >= candidate.end_time {
        return Err(DoctorError::InvalidSchedule("Start time must be before end time".to_string()));
    }

    if !(1..=7).contains(&candidate.day_of_week) {
        return Err(DoctorError::InvalidSchedule(
            "Day of week must be between 1 (Monday) and 7 (Sunday)".to_string(),
        ));
    }

    let slot = candidate.slot_duration_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&slot) {
        return Err(DoctorError::InvalidSchedule(format!(
            "Slot duration must be between {} and {} minutes",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
        )));
    }

    let overlapping = existing.iter().any(|s| {
        s.is_active
            && s.doctor_id == candidate.doctor_id
            && s.day_of_week == candidate.day_of_week
            && s.overlaps(candidate.start_time, candidate.end_time)
    });
    if overlapping {
        return Err(DoctorError::ScheduleOverlap);
    }

    Ok(slot)
}
