use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub role: Option<String>,
    pub is_active: bool,
}

/// Outcome of resolving the patient for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPatient {
    pub patient_id: Uuid,
    pub created: bool,
}

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Exactly one of patient_id or user_id is required")]
    AmbiguousIdentity,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
