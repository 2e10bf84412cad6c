use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;

/// The slice of a doctor's profile the scheduling engine reads: identity,
/// booking-number scope and fee schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_code: Option<String>,
    pub consultation_fee: Option<f64>,
    pub follow_up_fee: Option<f64>,
    pub follow_up_days: Option<i32>,
    pub is_active: bool,
}

impl DoctorProfile {
    /// Doctor code if set and non-blank.
    pub fn code(&self) -> Option<&str> {
        self.doctor_code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicInfo {
    pub id: Uuid,
    pub clinic_code: Option<String>,
    pub name: Option<String>,
    pub is_active: bool,
}

impl ClinicInfo {
    pub fn code(&self) -> Option<&str> {
        self.clinic_code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// One open-hours window of a doctor on a weekday (1 = Monday .. 7 = Sunday).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: bool,
}

impl DoctorSchedule {
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start_time < end && start < self.end_time
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduleRequest {
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: Option<i32>,
}

pub const DEFAULT_SLOT_MINUTES: i32 = 12;
pub const MIN_SLOT_MINUTES: i32 = 5;
pub const MAX_SLOT_MINUTES: i32 = 120;

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not active")]
    DoctorInactive,

    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("Clinic is not active")]
    ClinicInactive,

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Schedule overlaps an existing active schedule for this day")]
    ScheduleOverlap,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
