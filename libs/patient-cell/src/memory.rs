use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{PatientError, PatientRecord, UserRecord};
use crate::services::PatientDirectory;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    patients: HashMap<Uuid, PatientRecord>,
    clinic_links: HashSet<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    tables: RwLock<Tables>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, is_active: bool) -> Uuid {
        self.add_user_with_role("patient", is_active).await
    }

    pub async fn add_user_with_role(&self, role: &str, is_active: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.insert_user(id, role, is_active).await;
        id
    }

    /// Register a user under a known id, e.g. the subject of a test token.
    pub async fn insert_user(&self, id: Uuid, role: &str, is_active: bool) {
        self.tables.write().await.users.insert(
            id,
            UserRecord {
                id,
                role: Some(role.to_string()),
                is_active,
            },
        );
    }

    pub async fn add_patient(&self, user_id: Option<Uuid>, is_active: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.tables
            .write()
            .await
            .patients
            .insert(id, PatientRecord { id, user_id, is_active });
        id
    }

    pub async fn is_assigned(&self, patient_id: Uuid, clinic_id: Uuid) -> bool {
        self.tables.read().await.clinic_links.contains(&(patient_id, clinic_id))
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn patient_is_active(&self, patient_id: Uuid) -> Result<bool, PatientError> {
        let tables = self.tables.read().await;
        Ok(match tables.patients.get(&patient_id) {
            Some(p) if p.is_active => p
                .user_id
                .map(|u| tables.users.get(&u).is_some_and(|user| user.is_active))
                .unwrap_or(true),
            _ => false,
        })
    }

    async fn user_is_active(&self, user_id: Uuid) -> Result<bool, PatientError> {
        Ok(self.tables.read().await.users.get(&user_id).is_some_and(|u| u.is_active))
    }

    async fn find_active_patient_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, PatientError> {
        Ok(self
            .tables
            .read()
            .await
            .patients
            .values()
            .find(|p| p.is_active && p.user_id == Some(user_id))
            .map(|p| p.id))
    }

    async fn create_patient_for_user(&self, user_id: Uuid) -> Result<Uuid, PatientError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.patients.values().find(|p| p.is_active && p.user_id == Some(user_id)) {
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        tables.patients.insert(
            id,
            PatientRecord {
                id,
                user_id: Some(user_id),
                is_active: true,
            },
        );
        Ok(id)
    }

    async fn assign_to_clinic(&self, patient_id: Uuid, clinic_id: Uuid) -> Result<(), PatientError> {
        self.tables.write().await.clinic_links.insert((patient_id, clinic_id));
        Ok(())
    }
}
