use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{PatientError, ResolvedPatient};
use crate::services::PatientDirectory;

/// Resolve the patient a booking is for. A `user_id` without a patient
/// record gets one created and linked to `clinic_id`; the clinic link is
/// best-effort.
pub async fn resolve_patient(
    directory: &dyn PatientDirectory,
    patient_id: Option<Uuid>,
    user_id: Option<Uuid>,
    clinic_id: Uuid,
) -> Result<ResolvedPatient, PatientError> {
    match (patient_id, user_id) {
        (Some(patient_id), None) => {
            if !directory.patient_is_active(patient_id).await? {
                return Err(PatientError::PatientNotFound);
            }
            Ok(ResolvedPatient { patient_id, created: false })
        }
        (None, Some(user_id)) => {
            if !directory.user_is_active(user_id).await? {
                return Err(PatientError::UserNotFound);
            }

            if let Some(patient_id) = directory.find_active_patient_for_user(user_id).await? {
                return Ok(ResolvedPatient { patient_id, created: false });
            }

            let patient_id = directory.create_patient_for_user(user_id).await?;
            info!("Created patient {} for user {}", patient_id, user_id);

            if let Err(e) = directory.assign_to_clinic(patient_id, clinic_id).await {
                warn!("Failed to assign patient {} to clinic {}: {}", patient_id, clinic_id, e);
            }

            Ok(ResolvedPatient { patient_id, created: true })
        }
        _ => Err(PatientError::AmbiguousIdentity),
    }
}
