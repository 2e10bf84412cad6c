#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentStatus, ConsultationType, CreateAppointmentRequest, PaymentStatus,
};
use appointment_cell::{AppointmentState, InMemorySchedulingStore};
use doctor_cell::{ClinicInfo, DoctorProfile, InMemoryDoctorDirectory, InMemoryScheduleCatalog, NewScheduleRequest};
use patient_cell::InMemoryPatientDirectory;
use shared_config::AppConfig;
use shared_utils::test_utils::TestConfig;

/// One clinic with doctor `D1` working Wednesdays 09:00-12:00 in 12 minute
/// slots, one registered patient and one receptionist.
pub struct ClinicFixture {
    pub config: Arc<AppConfig>,
    pub state: AppointmentState,
    pub store: Arc<InMemorySchedulingStore>,
    pub doctors: Arc<InMemoryDoctorDirectory>,
    pub schedules: Arc<InMemoryScheduleCatalog>,
    pub patients: Arc<InMemoryPatientDirectory>,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub staff_id: Uuid,
}

pub fn wednesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
}

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    wednesday().and_hms_opt(h, m, 0).unwrap()
}

impl ClinicFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default().to_arc()).await
    }

    pub async fn with_config(config: Arc<AppConfig>) -> Self {
        let store = Arc::new(InMemorySchedulingStore::new());
        let doctors = Arc::new(InMemoryDoctorDirectory::new());
        let schedules = Arc::new(InMemoryScheduleCatalog::new());
        let patients = Arc::new(InMemoryPatientDirectory::new());

        let clinic_id = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();

        doctors
            .upsert_clinic(ClinicInfo {
                id: clinic_id,
                clinic_code: Some("CLN".to_string()),
                name: Some("Riverside Clinic".to_string()),
                is_active: true,
            })
            .await;
        doctors
            .upsert_doctor(DoctorProfile {
                id: doctor_id,
                clinic_id,
                doctor_code: Some("D1".to_string()),
                consultation_fee: Some(100.0),
                follow_up_fee: Some(50.0),
                follow_up_days: Some(7),
                is_active: true,
            })
            .await;
        schedules
            .add_schedule(NewScheduleRequest {
                doctor_id,
                day_of_week: 3,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                slot_duration_minutes: Some(12),
            })
            .await
            .unwrap();

        let patient_user = patients.add_user_with_role("patient", true).await;
        let patient_id = patients.add_patient(Some(patient_user), true).await;
        let staff_id = patients.add_user_with_role("receptionist", true).await;

        let state = AppointmentState::new(
            Arc::clone(&config),
            store.clone(),
            doctors.clone(),
            schedules.clone(),
            patients.clone(),
        );

        Self {
            config,
            state,
            store,
            doctors,
            schedules,
            patients,
            clinic_id,
            doctor_id,
            patient_id,
            staff_id,
        }
    }

    /// A `new` consultation for the registered patient on the fixture Wednesday.
    pub fn booking(&self, hh_mm: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id: Some(self.patient_id),
            user_id: None,
            clinic_id: self.clinic_id,
            doctor_id: self.doctor_id,
            department_id: None,
            appointment_date: "2024-01-10".to_string(),
            appointment_time: format!("2024-01-10 {}:00", hh_mm),
            duration_minutes: None,
            consultation_type: "new".to_string(),
            reason: Some("Persistent cough".to_string()),
            notes: None,
            is_priority: None,
            payment_mode: None,
        }
    }

    /// A finished visit in the past, for follow-up pricing.
    pub async fn seed_completed_visit(&self, start: NaiveDateTime) -> Appointment {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            booking_number: format!("D1-{}-0001", start.format("%Y%m%d")),
            patient_id: self.patient_id,
            clinic_id: self.clinic_id,
            doctor_id: self.doctor_id,
            department_id: None,
            appointment_date: start.date(),
            appointment_time: start,
            duration_minutes: 12,
            consultation_type: ConsultationType::New,
            reason: None,
            notes: None,
            status: AppointmentStatus::Completed,
            fee_amount: Some(100.0),
            payment_status: PaymentStatus::Paid,
            payment_mode: None,
            is_priority: false,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store.seed_appointment(appointment.clone()).await;
        appointment
    }
}
