// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::DoctorError;
use patient_cell::PatientError;
use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub booking_number: String,
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub department_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    /// Clinic-local start time.
    pub appointment_time: NaiveDateTime,
    pub duration_minutes: i32,
    pub consultation_type: ConsultationType,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    /// `None` means no charge.
    pub fee_amount: Option<f64>,
    pub payment_status: PaymentStatus,
    pub payment_mode: Option<PaymentMode>,
    pub is_priority: bool,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn end_time(&self) -> NaiveDateTime {
        self.appointment_time + Duration::minutes(self.duration_minutes as i64)
    }

    /// Counts for overlap checks and the waiting queue.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Arrived,
    InConsultation,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "booked",
            AppointmentStatus::Arrived => "arrived",
            AppointmentStatus::InConsultation => "in_consultation",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(AppointmentStatus::Booked),
            "arrived" => Ok(AppointmentStatus::Arrived),
            "in_consultation" => Ok(AppointmentStatus::InConsultation),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(AppointmentError::ValidationError(format!("Unknown status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationType {
    New,
    Followup,
    Walkin,
    Emergency,
}

impl ConsultationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationType::New => "new",
            ConsultationType::Followup => "followup",
            ConsultationType::Walkin => "walkin",
            ConsultationType::Emergency => "emergency",
        }
    }
}

impl FromStr for ConsultationType {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ConsultationType::New),
            "followup" => Ok(ConsultationType::Followup),
            "walkin" => Ok(ConsultationType::Walkin),
            "emergency" => Ok(ConsultationType::Emergency),
            other => Err(AppointmentError::ValidationError(format!(
                "consultation_type must be one of new, followup, walkin, emergency (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
}

impl FromStr for PaymentMode {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMode::Cash),
            "card" => Ok(PaymentMode::Card),
            "upi" => Ok(PaymentMode::Upi),
            other => Err(AppointmentError::ValidationError(format!(
                "payment_mode must be one of cash, card, upi (got '{}')",
                other
            ))),
        }
    }
}

// ==============================================================================
// CHECK-IN AND VITALS MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientCheckin {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub checkin_time: DateTime<Utc>,
    pub checked_in_by: Option<Uuid>,
    pub vitals_recorded: bool,
    pub payment_collected: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientVitals {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub recorded_by: Uuid,
    pub bp_systolic: Option<i32>,
    pub bp_diastolic: Option<i32>,
    pub temperature: Option<f64>,
    pub pulse_rate: Option<i32>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl PatientVitals {
    pub fn signs(&self) -> VitalSigns {
        VitalSigns {
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
            temperature: self.temperature,
            pulse_rate: self.pulse_rate,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
        }
    }

    /// Body-mass index when both height and weight were measured.
    pub fn bmi(&self) -> Option<f64> {
        match (self.height_cm, self.weight_kg) {
            (Some(height), Some(weight)) if height > 0.0 => {
                let metres = height / 100.0;
                Some(weight / (metres * metres))
            }
            _ => None,
        }
    }
}

/// The measured values of a vitals reading, any of which may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VitalSigns {
    pub bp_systolic: Option<i32>,
    pub bp_diastolic: Option<i32>,
    pub temperature: Option<f64>,
    pub pulse_rate: Option<i32>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
}

impl VitalSigns {
    pub fn is_empty(&self) -> bool {
        *self == VitalSigns::default()
    }

    /// `self` with every value present in `update` replaced.
    pub fn overlay(self, update: VitalSigns) -> VitalSigns {
        VitalSigns {
            bp_systolic: update.bp_systolic.or(self.bp_systolic),
            bp_diastolic: update.bp_diastolic.or(self.bp_diastolic),
            temperature: update.temperature.or(self.temperature),
            pulse_rate: update.pulse_rate.or(self.pulse_rate),
            height_cm: update.height_cm.or(self.height_cm),
            weight_kg: update.weight_kg.or(self.weight_kg),
        }
    }
}

// ==============================================================================
// READ MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_booked: bool,
    pub appointment_id: Option<Uuid>,
}

/// A checked-in patient waiting for (or with) the doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    pub position: usize,
    pub appointment_id: Uuid,
    pub booking_number: String,
    pub patient_id: Uuid,
    pub status: AppointmentStatus,
    pub is_priority: bool,
    pub checkin_time: DateTime<Utc>,
    pub appointment_time: NaiveDateTime,
}

/// Typed filter for appointment listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentQuery {
    pub clinic_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub limit: usize,
    pub offset: usize,
}

/// Typed filter for check-in listings. `date` is the calendar day (UTC) of
/// the check-in itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckinQuery {
    pub appointment_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub limit: usize,
    pub offset: usize,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub department_id: Option<Uuid>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub duration_minutes: Option<i32>,
    pub consultation_type: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub is_priority: Option<bool>,
    pub payment_mode: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAppointmentResponse {
    pub appointment: Appointment,
    pub patient_created: bool,
    /// Present when payment was taken at booking and the check-in was recorded.
    pub checkin: Option<PatientCheckin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_appointment_time: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListAppointmentsParams {
    pub clinic_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCheckinsParams {
    pub appointment_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub date: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VitalsHistoryParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckinRequest {
    pub appointment_id: Uuid,
    /// Defaults to the caller.
    pub checked_in_by: Option<Uuid>,
    pub payment_collected: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCheckinRequest {
    pub vitals_recorded: Option<bool>,
    pub payment_collected: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordVitalsRequest {
    pub appointment_id: Uuid,
    /// Defaults to the caller.
    pub recorded_by: Option<Uuid>,
    pub bp_systolic: Option<i32>,
    pub bp_diastolic: Option<i32>,
    pub temperature: Option<f64>,
    pub pulse_rate: Option<i32>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
}

impl RecordVitalsRequest {
    pub fn signs(&self) -> VitalSigns {
        VitalSigns {
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
            temperature: self.temperature,
            pulse_rate: self.pulse_rate,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
        }
    }
}

/// Correction of an existing reading; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVitalsRequest {
    pub bp_systolic: Option<i32>,
    pub bp_diastolic: Option<i32>,
    pub temperature: Option<f64>,
    pub pulse_rate: Option<i32>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
}

impl UpdateVitalsRequest {
    pub fn signs(&self) -> VitalSigns {
        VitalSigns {
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
            temperature: self.temperature,
            pulse_rate: self.pulse_rate,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
        }
    }
}

// ==============================================================================
// VALIDATION RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct AppointmentValidationRules {
    pub default_duration_minutes: i32,
    pub min_duration_minutes: i32,
    pub max_duration_minutes: i32,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub default_history_size: usize,
}

impl Default for AppointmentValidationRules {
    fn default() -> Self {
        Self {
            default_duration_minutes: 12,
            min_duration_minutes: 1,
            max_duration_minutes: 240,
            default_page_size: 50,
            max_page_size: 200,
            default_history_size: 20,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// The kinds of failure a caller must be able to tell apart. `Internal`
/// covers failures that neither a retry nor different input will fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Transient,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Check-in not found")]
    CheckinNotFound,

    #[error("Vitals not found")]
    VitalsNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("Doctor is not available at the requested time")]
    DoctorNotAvailable,

    #[error("Booking number {0} already issued")]
    BookingNumberConflict(String),

    #[error("No booking numbers left for {0}")]
    BookingSerialExhausted(String),

    #[error("Patient already checked in")]
    DuplicateCheckin,

    #[error("Vitals already recorded for this appointment")]
    DuplicateVitals,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Appointment was modified concurrently: {0}")]
    ConcurrentModification(String),

    #[error("Temporary storage failure: {0}")]
    Transient(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::ValidationError(_) => ErrorKind::Validation,
            AppointmentError::NotFound
            | AppointmentError::CheckinNotFound
            | AppointmentError::VitalsNotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::UserNotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::ClinicNotFound => ErrorKind::NotFound,
            AppointmentError::DoctorNotAvailable
            | AppointmentError::BookingNumberConflict(_)
            | AppointmentError::BookingSerialExhausted(_)
            | AppointmentError::DuplicateCheckin
            | AppointmentError::DuplicateVitals
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::ConcurrentModification(_) => ErrorKind::Conflict,
            AppointmentError::Transient(_) => ErrorKind::Transient,
            AppointmentError::Storage(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => AppError::ValidationError(message),
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::Transient => AppError::ServiceUnavailable(message),
            ErrorKind::Internal => AppError::Internal(message),
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::DoctorNotFound | DoctorError::DoctorInactive => AppointmentError::DoctorNotFound,
            DoctorError::ClinicNotFound | DoctorError::ClinicInactive => AppointmentError::ClinicNotFound,
            DoctorError::InvalidSchedule(msg) => AppointmentError::ValidationError(msg),
            DoctorError::ScheduleOverlap => {
                AppointmentError::ValidationError("Schedule overlaps an existing schedule".to_string())
            }
            DoctorError::Database(e) => AppointmentError::from(e),
        }
    }
}

impl From<PatientError> for AppointmentError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::AmbiguousIdentity => {
                AppointmentError::ValidationError("Exactly one of patient_id or user_id is required".to_string())
            }
            PatientError::PatientNotFound => AppointmentError::PatientNotFound,
            PatientError::UserNotFound => AppointmentError::UserNotFound,
            PatientError::Database(e) => AppointmentError::from(e),
        }
    }
}

impl From<DatabaseError> for AppointmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Transient(msg) => AppointmentError::Transient(msg),
            DatabaseError::NotFound(_) => AppointmentError::NotFound,
            DatabaseError::Conflict { message, .. } => AppointmentError::ConcurrentModification(message),
            other => AppointmentError::Storage(other.to_string()),
        }
    }
}
