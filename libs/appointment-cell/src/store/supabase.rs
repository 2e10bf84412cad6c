use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{supabase::SupabaseClient, DatabaseError};

use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, CheckinQuery, PatientCheckin, PatientVitals,
};
use crate::store::{
    CheckedInAppointment, CheckinUpdate, NewAppointment, NewCheckin, NewVitals, SchedulingStore,
    StatusChange, StoreError, VitalsUpdate,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Postgres-backed store. Atomic operations are plpgsql functions called
/// over PostgREST RPC (see `supabase/migrations`); each runs as one
/// transaction holding the doctor's advisory lock.
pub struct SupabaseSchedulingStore {
    supabase: SupabaseClient,
}

impl SupabaseSchedulingStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn appointments(&self, query: &str) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?{}", query);
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_database_error)
    }

    async fn first_vitals(&self, query: &str) -> Result<Option<PatientVitals>, StoreError> {
        let path = format!("/rest/v1/patient_vitals?{}", query);
        let rows: Vec<PatientVitals> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_database_error)?;
        Ok(rows.into_iter().next())
    }
}

#[derive(Deserialize)]
struct VisitRow {
    appointment_time: NaiveDateTime,
}

/// Translate PostgREST failures raised by the scheduling functions and
/// constraints into store outcomes.
fn map_database_error(err: DatabaseError) -> StoreError {
    match err {
        DatabaseError::Transient(msg) => StoreError::Transient(msg),
        DatabaseError::NotFound(msg) if msg.contains("checkin_not_found") => StoreError::CheckinNotFound,
        DatabaseError::NotFound(_) => StoreError::NotFound,
        DatabaseError::Conflict { code, message } => match code.as_str() {
            "23P01" => StoreError::Overlap,
            "23503" => StoreError::NotFound,
            "23505" if message.contains("patient_checkins") => StoreError::DuplicateCheckin,
            "23505" if message.contains("patient_vitals") => StoreError::DuplicateVitals,
            "23505" => StoreError::DuplicateBookingNumber(message),
            "PT409" => {
                if let Some(prefix) = tagged_value(&message, "serial_exhausted:") {
                    StoreError::SerialExhausted(prefix.to_string())
                } else if let Some(status) = tagged_value(&message, "status_mismatch:") {
                    match status.parse::<AppointmentStatus>() {
                        Ok(current) => StoreError::StatusMismatch { current },
                        Err(_) => StoreError::Database(DatabaseError::Conflict { code, message }),
                    }
                } else {
                    StoreError::Database(DatabaseError::Conflict { code, message })
                }
            }
            _ => StoreError::Database(DatabaseError::Conflict { code, message }),
        },
        other => StoreError::Database(other),
    }
}

/// Value following `tag` up to the next non-identifier character.
fn tagged_value<'a>(message: &'a str, tag: &str) -> Option<&'a str> {
    let start = message.find(tag)? + tag.len();
    let rest = &message[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn ts(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

#[async_trait]
impl SchedulingStore for SupabaseSchedulingStore {
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let rows = self.appointments(&format!("id=eq.{}&select=*", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        self.appointments(&query.to_postgrest()).await
    }

    async fn active_appointments_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.appointments(&format!(
            "doctor_id=eq.{}&status=not.in.(cancelled,no_show)&appointment_time=gte.{}&appointment_time=lt.{}&select=*",
            doctor_id,
            ts(from),
            ts(to)
        ))
        .await
    }

    async fn appointments_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        self.appointments(&format!(
            "doctor_id=eq.{}&appointment_date=eq.{}&order=appointment_time.asc&select=*",
            doctor_id,
            date.format("%Y-%m-%d")
        ))
        .await
    }

    async fn last_completed_visit(&self, patient_id: Uuid, doctor_id: Uuid) -> Result<Option<NaiveDateTime>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&doctor_id=eq.{}&status=eq.completed&select=appointment_time&order=appointment_time.desc&limit=1",
            patient_id, doctor_id
        );
        let rows: Vec<VisitRow> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_database_error)?;
        Ok(rows.into_iter().next().map(|r| r.appointment_time))
    }

    async fn insert_booking(&self, draft: NewAppointment) -> Result<Appointment, StoreError> {
        debug!("Booking doctor {} at {} via RPC", draft.doctor_id, draft.appointment_time);
        self.supabase
            .rpc("book_appointment", json!({ "p_draft": draft }))
            .await
            .map_err(map_database_error)
    }

    async fn reschedule(&self, appointment_id: Uuid, new_time: NaiveDateTime) -> Result<Appointment, StoreError> {
        self.supabase
            .rpc(
                "reschedule_appointment",
                json!({ "p_appointment_id": appointment_id, "p_new_time": ts(new_time) }),
            )
            .await
            .map_err(map_database_error)
    }

    async fn transition_status(&self, change: StatusChange) -> Result<Appointment, StoreError> {
        self.supabase
            .rpc(
                "transition_appointment",
                json!({
                    "p_appointment_id": change.appointment_id,
                    "p_expected": change.expected,
                    "p_next": change.next,
                    "p_reason": change.cancellation_reason,
                }),
            )
            .await
            .map_err(map_database_error)
    }

    async fn get_checkin(&self, appointment_id: Uuid) -> Result<Option<PatientCheckin>, StoreError> {
        let path = format!("/rest/v1/patient_checkins?appointment_id=eq.{}&select=*", appointment_id);
        let rows: Vec<PatientCheckin> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_database_error)?;
        Ok(rows.into_iter().next())
    }

    async fn checkins_for(&self, appointment_ids: &[Uuid]) -> Result<Vec<PatientCheckin>, StoreError> {
        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = appointment_ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("/rest/v1/patient_checkins?appointment_id=in.({})&select=*", ids);
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_database_error)
    }

    async fn list_checkins(&self, query: &CheckinQuery) -> Result<Vec<PatientCheckin>, StoreError> {
        let path = format!("/rest/v1/patient_checkins?{}", query.to_postgrest());
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_database_error)
    }

    async fn create_checkin(&self, draft: NewCheckin) -> Result<PatientCheckin, StoreError> {
        let rows: Vec<PatientCheckin> = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/patient_checkins", json!(draft))
            .await
            .map_err(map_database_error)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Database(DatabaseError::Decode("empty check-in insert result".to_string())))
    }

    async fn check_in(&self, draft: NewCheckin) -> Result<CheckedInAppointment, StoreError> {
        self.supabase
            .rpc(
                "check_in_appointment",
                json!({
                    "p_appointment_id": draft.appointment_id,
                    "p_checked_in_by": draft.checked_in_by,
                    "p_payment_collected": draft.payment_collected,
                }),
            )
            .await
            .map_err(map_database_error)
    }

    async fn update_checkin(&self, appointment_id: Uuid, update: CheckinUpdate) -> Result<PatientCheckin, StoreError> {
        self.supabase
            .rpc(
                "update_checkin",
                json!({
                    "p_appointment_id": appointment_id,
                    "p_vitals_recorded": update.vitals_recorded,
                    "p_payment_collected": update.payment_collected,
                }),
            )
            .await
            .map_err(map_database_error)
    }

    async fn insert_vitals(&self, draft: NewVitals) -> Result<PatientVitals, StoreError> {
        let rows: Vec<PatientVitals> = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/patient_vitals", json!(draft))
            .await
            .map_err(map_database_error)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Database(DatabaseError::Decode("empty vitals insert result".to_string())))
    }

    async fn mark_vitals_recorded(&self, appointment_id: Uuid) -> Result<(), StoreError> {
        let path = format!("/rest/v1/patient_checkins?appointment_id=eq.{}", appointment_id);
        let rows: Vec<PatientCheckin> = self
            .supabase
            .write_returning(Method::PATCH, &path, json!({ "vitals_recorded": true }))
            .await
            .map_err(map_database_error)?;
        if rows.is_empty() {
            warn!("No check-in row to flag vitals for appointment {}", appointment_id);
            return Err(StoreError::CheckinNotFound);
        }
        Ok(())
    }

    async fn get_vitals(&self, appointment_id: Uuid) -> Result<Option<PatientVitals>, StoreError> {
        self.first_vitals(&format!("appointment_id=eq.{}&select=*", appointment_id)).await
    }

    async fn get_vitals_by_id(&self, vitals_id: Uuid) -> Result<Option<PatientVitals>, StoreError> {
        self.first_vitals(&format!("id=eq.{}&select=*", vitals_id)).await
    }

    async fn update_vitals(&self, vitals_id: Uuid, update: VitalsUpdate) -> Result<PatientVitals, StoreError> {
        let path = format!("/rest/v1/patient_vitals?id=eq.{}", vitals_id);
        let rows: Vec<PatientVitals> = self
            .supabase
            .write_returning(Method::PATCH, &path, json!(update))
            .await
            .map_err(map_database_error)?;
        rows.into_iter().next().ok_or(StoreError::VitalsNotFound)
    }

    async fn vitals_for_patient(
        &self,
        patient_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PatientVitals>, StoreError> {
        let path = format!(
            "/rest/v1/patient_vitals?select=*,appointments!inner(patient_id)&appointments.patient_id=eq.{}\
             &order=recorded_at.desc&limit={}&offset={}",
            patient_id, limit, offset
        );
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(map_database_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn conflict(code: &str, message: &str) -> DatabaseError {
        DatabaseError::Conflict {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn constraint_violations_map_to_store_outcomes() {
        assert_matches!(
            map_database_error(conflict("23P01", "conflicting key value violates exclusion constraint \"appointments_no_overlap\"")),
            StoreError::Overlap
        );
        assert_matches!(
            map_database_error(conflict("23505", "duplicate key value violates unique constraint \"patient_checkins_appointment_id_key\"")),
            StoreError::DuplicateCheckin
        );
        assert_matches!(
            map_database_error(conflict("23505", "duplicate key value violates unique constraint \"appointments_booking_number_key\"")),
            StoreError::DuplicateBookingNumber(_)
        );
        assert_matches!(map_database_error(conflict("23503", "violates foreign key")), StoreError::NotFound);
    }

    #[test]
    fn raised_exceptions_carry_their_payload() {
        assert_matches!(
            map_database_error(conflict("PT409", "status_mismatch:in_consultation")),
            StoreError::StatusMismatch { current: AppointmentStatus::InConsultation }
        );
        assert_matches!(
            map_database_error(conflict("PT409", "serial_exhausted:D1-20240110 (no serials left)")),
            StoreError::SerialExhausted(p) if p == "D1-20240110"
        );
        assert_matches!(
            map_database_error(DatabaseError::NotFound("checkin_not_found".into())),
            StoreError::CheckinNotFound
        );
        assert_matches!(
            map_database_error(DatabaseError::Transient("deadlock detected".into())),
            StoreError::Transient(_)
        );
    }
}
