//! Persistence seam of the scheduling engine.
//!
//! Reads are plain lookups. Every write that depends on current state (overlap
//! check, serial allocation, status compare-and-set) is a single atomic store
//! call, so the engine never holds a transaction open across awaits.

pub mod memory;
pub mod query;
pub mod supabase;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, CheckinQuery, ConsultationType,
    PatientCheckin, PatientVitals, PaymentMode, PaymentStatus,
};

pub use memory::InMemorySchedulingStore;
pub use supabase::SupabaseSchedulingStore;

/// A priced, validated booking waiting for its booking number. `id` is
/// chosen by the caller so a retried insert can recognise its own row.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub department_id: Option<Uuid>,
    pub scope_code: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveDateTime,
    pub duration_minutes: i32,
    pub consultation_type: ConsultationType,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub fee_amount: Option<f64>,
    pub payment_status: PaymentStatus,
    pub payment_mode: Option<PaymentMode>,
    pub is_priority: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCheckin {
    pub appointment_id: Uuid,
    pub checked_in_by: Option<Uuid>,
    pub payment_collected: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckinUpdate {
    pub vitals_recorded: Option<bool>,
    pub payment_collected: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVitals {
    pub appointment_id: Uuid,
    pub recorded_by: Uuid,
    pub bp_systolic: Option<i32>,
    pub bp_diastolic: Option<i32>,
    pub temperature: Option<f64>,
    pub pulse_rate: Option<i32>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
}

/// Fields to overwrite on a vitals row; `None` leaves the column alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VitalsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_systolic: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bp_diastolic: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pulse_rate: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Compare-and-set of an appointment's status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub appointment_id: Uuid,
    pub expected: AppointmentStatus,
    pub next: AppointmentStatus,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckedInAppointment {
    pub appointment: Appointment,
    pub checkin: PatientCheckin,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Check-in not found")]
    CheckinNotFound,

    #[error("Vitals not found")]
    VitalsNotFound,

    #[error("Requested interval overlaps an active appointment")]
    Overlap,

    #[error("Booking number {0} already exists")]
    DuplicateBookingNumber(String),

    #[error("Booking serials exhausted for {0}")]
    SerialExhausted(String),

    #[error("Appointment already has a check-in")]
    DuplicateCheckin,

    #[error("Appointment already has vitals")]
    DuplicateVitals,

    #[error("Appointment status is {current}")]
    StatusMismatch { current: AppointmentStatus },

    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppointmentError::NotFound,
            StoreError::CheckinNotFound => AppointmentError::CheckinNotFound,
            StoreError::VitalsNotFound => AppointmentError::VitalsNotFound,
            StoreError::Overlap => AppointmentError::DoctorNotAvailable,
            StoreError::DuplicateBookingNumber(n) => AppointmentError::BookingNumberConflict(n),
            StoreError::SerialExhausted(scope) => AppointmentError::BookingSerialExhausted(scope),
            StoreError::DuplicateCheckin => AppointmentError::DuplicateCheckin,
            StoreError::DuplicateVitals => AppointmentError::DuplicateVitals,
            StoreError::StatusMismatch { current } => {
                AppointmentError::ConcurrentModification(format!("status is now {}", current))
            }
            StoreError::Transient(msg) => AppointmentError::Transient(msg),
            StoreError::Database(e) => AppointmentError::from(e),
        }
    }
}

#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError>;

    /// Active appointments of the doctor starting in `[from, to)`.
    async fn active_appointments_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Every appointment of the doctor on `date`, any status.
    async fn appointments_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, StoreError>;

    /// Start time of the patient's latest completed visit with the doctor.
    async fn last_completed_visit(&self, patient_id: Uuid, doctor_id: Uuid) -> Result<Option<NaiveDateTime>, StoreError>;

    /// Re-check overlap, allocate the next serial for (scope, date) and insert,
    /// all or nothing. If a row with `draft.id` already exists it is returned
    /// unchanged.
    async fn insert_booking(&self, draft: NewAppointment) -> Result<Appointment, StoreError>;

    /// Move a `booked` appointment to a new start time if the doctor is free,
    /// excluding the appointment's own slot.
    async fn reschedule(&self, appointment_id: Uuid, new_time: NaiveDateTime) -> Result<Appointment, StoreError>;

    async fn transition_status(&self, change: StatusChange) -> Result<Appointment, StoreError>;

    async fn get_checkin(&self, appointment_id: Uuid) -> Result<Option<PatientCheckin>, StoreError>;

    async fn checkins_for(&self, appointment_ids: &[Uuid]) -> Result<Vec<PatientCheckin>, StoreError>;

    /// Newest check-in first.
    async fn list_checkins(&self, query: &CheckinQuery) -> Result<Vec<PatientCheckin>, StoreError>;

    /// Insert a check-in row without touching the appointment.
    async fn create_checkin(&self, draft: NewCheckin) -> Result<PatientCheckin, StoreError>;

    /// Insert the check-in, move `booked -> arrived` and record payment.
    async fn check_in(&self, draft: NewCheckin) -> Result<CheckedInAppointment, StoreError>;

    async fn update_checkin(&self, appointment_id: Uuid, update: CheckinUpdate) -> Result<PatientCheckin, StoreError>;

    async fn insert_vitals(&self, draft: NewVitals) -> Result<PatientVitals, StoreError>;

    async fn mark_vitals_recorded(&self, appointment_id: Uuid) -> Result<(), StoreError>;

    async fn get_vitals(&self, appointment_id: Uuid) -> Result<Option<PatientVitals>, StoreError>;

    async fn get_vitals_by_id(&self, vitals_id: Uuid) -> Result<Option<PatientVitals>, StoreError>;

    async fn update_vitals(&self, vitals_id: Uuid, update: VitalsUpdate) -> Result<PatientVitals, StoreError>;

    /// The patient's readings across all appointments, newest first.
    async fn vitals_for_patient(
        &self,
        patient_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PatientVitals>, StoreError>;
}
