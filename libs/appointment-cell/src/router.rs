// libs/appointment-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: AppointmentState) -> Router {
    // Every scheduling operation requires an authenticated clinic user
    let protected_routes = Router::new()
        .route(
            "/appointments",
            post(handlers::create_appointment).get(handlers::list_appointments),
        )
        .route("/appointments/slots/available", get(handlers::get_available_slots))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route("/appointments/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/status", patch(handlers::update_appointment_status))

        // Front desk
        .route("/checkins", post(handlers::create_checkin).get(handlers::list_checkins))
        .route("/checkins/doctor/{doctor_id}/queue", get(handlers::get_doctor_queue))
        .route(
            "/checkins/{appointment_id}",
            get(handlers::get_checkin).patch(handlers::update_checkin),
        )
        .route("/vitals", post(handlers::record_vitals))
        .route("/vitals/appointment/{appointment_id}", get(handlers::get_appointment_vitals))
        .route("/vitals/patient/{patient_id}/history", get(handlers::get_patient_vitals_history))
        .route("/vitals/{vitals_id}", put(handlers::update_vitals))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
