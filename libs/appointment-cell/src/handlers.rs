// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    CancelAppointmentRequest, CreateAppointmentRequest, CreateCheckinRequest, ListAppointmentsParams,
    ListCheckinsParams, RecordVitalsRequest, RescheduleAppointmentRequest, UpdateCheckinRequest,
    UpdateStatusRequest, UpdateVitalsRequest, VitalsHistoryParams,
};
use crate::services::validation::parse_date;
use crate::state::AppointmentState;

const FRONT_DESK: &[&str] = &["clinic_admin", "receptionist"];
const CLINIC_STAFF: &[&str] = &["clinic_admin", "doctor", "receptionist"];

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub doctor_id: Uuid,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    /// Defaults to today.
    pub date: Option<String>,
}

/// The caller's own id, used as the default actor for check-ins and vitals.
fn caller_id(user: &User) -> Option<Uuid> {
    Uuid::parse_str(&user.id).ok()
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let created = state.appointments.create_appointment(request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": created.appointment,
        "patient_created": created.patient_created,
        "checkin": created.checkin,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(params): Query<ListAppointmentsParams>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let appointments = state.appointments.list_appointments(&params).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let appointment = state.appointments.get_appointment(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let appointment = state
        .appointments
        .reschedule_appointment(appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let appointment = state.appointments.cancel_appointment(appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let appointment = state.appointments.update_status(appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let date = parse_date(&query.date)?;
    let slots = state.appointments.available_slots(query.doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "date": date,
        "slots": slots
    })))
}

// ==============================================================================
// CHECK-IN, QUEUE AND VITALS HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_checkin(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateCheckinRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let checked_in = state.checkins.check_in(request, caller_id(&user)).await?;

    Ok(Json(json!({
        "success": true,
        "checkin": checked_in.checkin,
        "appointment": checked_in.appointment
    })))
}

#[axum::debug_handler]
pub async fn list_checkins(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(params): Query<ListCheckinsParams>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let checkins = state.checkins.list_checkins(&params).await?;

    Ok(Json(json!({
        "total": checkins.len(),
        "checkins": checkins
    })))
}

#[axum::debug_handler]
pub async fn get_checkin(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let checkin = state.checkins.get_checkin(appointment_id).await?;
    Ok(Json(json!(checkin)))
}

#[axum::debug_handler]
pub async fn update_checkin(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateCheckinRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK)?;

    let checkin = state.checkins.update_checkin(appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "checkin": checkin
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_queue(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => Local::now().date_naive(),
    };
    let queue = state.appointments.doctor_queue(doctor_id, date).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "queue": queue
    })))
}

#[axum::debug_handler]
pub async fn record_vitals(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<RecordVitalsRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let vitals = state.checkins.record_vitals(request, caller_id(&user)).await?;

    Ok(Json(json!({
        "success": true,
        "vitals": vitals
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_vitals(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let vitals = state.checkins.get_vitals(appointment_id).await?;

    Ok(Json(json!({
        "bmi": vitals.bmi(),
        "vitals": vitals
    })))
}

#[axum::debug_handler]
pub async fn update_vitals(
    State(state): State<AppointmentState>,
    Path(vitals_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateVitalsRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let vitals = state.checkins.update_vitals(vitals_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "vitals": vitals
    })))
}

#[axum::debug_handler]
pub async fn get_patient_vitals_history(
    State(state): State<AppointmentState>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Query(params): Query<VitalsHistoryParams>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, CLINIC_STAFF)?;

    let history = state.checkins.vitals_history(patient_id, &params).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "count": history.len(),
        "vitals_history": history
    })))
}
