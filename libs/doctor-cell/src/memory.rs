use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{ClinicInfo, DoctorError, DoctorProfile, DoctorSchedule, NewScheduleRequest};
use crate::services::{validate_new_schedule, DoctorDirectory, ScheduleCatalog};

/// Process-local doctor/clinic directory for tests and memory-backed runs.
#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    doctors: RwLock<HashMap<Uuid, DoctorProfile>>,
    clinics: RwLock<HashMap<Uuid, ClinicInfo>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_doctor(&self, doctor: DoctorProfile) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }

    pub async fn upsert_clinic(&self, clinic: ClinicInfo) {
        self.clinics.write().await.insert(clinic.id, clinic);
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>, DoctorError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }

    async fn clinic(&self, clinic_id: Uuid) -> Result<Option<ClinicInfo>, DoctorError> {
        Ok(self.clinics.read().await.get(&clinic_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryScheduleCatalog {
    rows: RwLock<Vec<DoctorSchedule>>,
}

impl InMemoryScheduleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a new schedule row.
    pub async fn add_schedule(&self, request: NewScheduleRequest) -> Result<DoctorSchedule, DoctorError> {
        let mut rows = self.rows.write().await;
        let slot = validate_new_schedule(&rows, &request)?;
        let schedule = DoctorSchedule {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            slot_duration_minutes: slot,
            is_active: true,
        };
        rows.push(schedule.clone());
        Ok(schedule)
    }
}

#[async_trait]
impl ScheduleCatalog for InMemoryScheduleCatalog {
    async fn schedules_for_day(&self, doctor_id: Uuid, day_of_week: u32) -> Result<Vec<DoctorSchedule>, DoctorError> {
        let rows = self.rows.read().await;
        let mut matching: Vec<DoctorSchedule> = rows
            .iter()
            .filter(|s| s.is_active && s.doctor_id == doctor_id && s.day_of_week == day_of_week as i32)
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.start_time);
        Ok(matching)
    }
}
