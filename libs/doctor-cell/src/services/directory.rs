use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ClinicInfo, DoctorError, DoctorProfile};

#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>, DoctorError>;

    async fn clinic(&self, clinic_id: Uuid) -> Result<Option<ClinicInfo>, DoctorError>;

    /// The doctor, provided it exists and is active.
    async fn active_doctor(&self, doctor_id: Uuid) -> Result<DoctorProfile, DoctorError> {
        match self.doctor(doctor_id).await? {
            Some(doctor) if doctor.is_active => Ok(doctor),
            Some(_) => Err(DoctorError::DoctorInactive),
            None => Err(DoctorError::DoctorNotFound),
        }
    }

    async fn active_clinic(&self, clinic_id: Uuid) -> Result<ClinicInfo, DoctorError> {
        match self.clinic(clinic_id).await? {
            Some(clinic) if clinic.is_active => Ok(clinic),
            Some(_) => Err(DoctorError::ClinicInactive),
            None => Err(DoctorError::ClinicNotFound),
        }
    }

    /// Namespace for booking-number serials: the doctor code, else the code of
    /// the doctor's clinic.
    async fn scope_code(&self, doctor: &DoctorProfile) -> Result<Option<String>, DoctorError> {
        if let Some(code) = doctor.code() {
            return Ok(Some(code.to_string()));
        }
        let clinic = self.clinic(doctor.clinic_id).await?;
        Ok(clinic.as_ref().and_then(|c| c.code()).map(str::to_string))
    }
}

pub struct SupabaseDoctorDirectory {
    supabase: SupabaseClient,
}

impl SupabaseDoctorDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>, DoctorError> {
        debug!("Fetching doctor {}", doctor_id);
        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select=id,clinic_id,doctor_code,consultation_fee,follow_up_fee,follow_up_days,is_active",
            doctor_id
        );
        let rows: Vec<DoctorProfile> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn clinic(&self, clinic_id: Uuid) -> Result<Option<ClinicInfo>, DoctorError> {
        debug!("Fetching clinic {}", clinic_id);
        let path = format!(
            "/rest/v1/clinics?id=eq.{}&select=id,clinic_code,name,is_active",
            clinic_id
        );
        let rows: Vec<ClinicInfo> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }
}
