use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{supabase::SupabaseClient, DatabaseError};

use crate::models::{PatientError, PatientRecord, UserRecord};

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// True when the patient row and its owning user are both active.
    async fn patient_is_active(&self, patient_id: Uuid) -> Result<bool, PatientError>;

    async fn user_is_active(&self, user_id: Uuid) -> Result<bool, PatientError>;

    async fn find_active_patient_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, PatientError>;

    async fn create_patient_for_user(&self, user_id: Uuid) -> Result<Uuid, PatientError>;

    /// Link the patient to a clinic; a no-op when the link exists.
    async fn assign_to_clinic(&self, patient_id: Uuid, clinic_id: Uuid) -> Result<(), PatientError>;
}

pub struct SupabasePatientDirectory {
    supabase: SupabaseClient,
}

impl SupabasePatientDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn patient_is_active(&self, patient_id: Uuid) -> Result<bool, PatientError> {
        let path = format!(
            "/rest/v1/patients?id=eq.{}&is_active=eq.true&select=id,user_id,is_active",
            patient_id
        );
        let rows: Vec<PatientRecord> = self.supabase.request(Method::GET, &path, None, None).await?;
        match rows.into_iter().next() {
            Some(PatientRecord { user_id: Some(user_id), .. }) => self.user_is_active(user_id).await,
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn user_is_active(&self, user_id: Uuid) -> Result<bool, PatientError> {
        let path = format!("/rest/v1/users?id=eq.{}&select=id,role,is_active", user_id);
        let rows: Vec<UserRecord> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().any(|u| u.is_active))
    }

    async fn find_active_patient_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, PatientError> {
        let path = format!(
            "/rest/v1/patients?user_id=eq.{}&is_active=eq.true&select=id,user_id,is_active",
            user_id
        );
        let rows: Vec<PatientRecord> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next().map(|p| p.id))
    }

    async fn create_patient_for_user(&self, user_id: Uuid) -> Result<Uuid, PatientError> {
        debug!("Creating patient record for user {}", user_id);
        let created: Result<Vec<PatientRecord>, DatabaseError> = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/patients", json!({ "user_id": user_id, "is_active": true }))
            .await;

        match created {
            Ok(rows) => rows
                .into_iter()
                .next()
                .map(|p| p.id)
                .ok_or_else(|| PatientError::Database(DatabaseError::Decode("empty insert result".to_string()))),
            // another request created it first
            Err(DatabaseError::Conflict { code, .. }) if code == "23505" => {
                warn!("Patient for user {} created concurrently, re-reading", user_id);
                self.find_active_patient_for_user(user_id)
                    .await?
                    .ok_or(PatientError::PatientNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn assign_to_clinic(&self, patient_id: Uuid, clinic_id: Uuid) -> Result<(), PatientError> {
        let _: Option<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patient_clinics?on_conflict=patient_id,clinic_id",
                None,
                Some(json!({ "patient_id": patient_id, "clinic_id": clinic_id, "is_primary": true })),
                &[("prefer", "resolution=ignore-duplicates")],
            )
            .await?;
        Ok(())
    }
}
