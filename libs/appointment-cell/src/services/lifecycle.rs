// libs/appointment-cell/src/services/lifecycle.rs
use tracing::debug;

use crate::models::{AppointmentError, AppointmentStatus};

/// Transition rules of the appointment state machine.
///
/// ```text
/// booked -> arrived -> in_consultation -> completed
/// booked | arrived -> cancelled
/// booked | arrived -> no_show
/// ```
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn allowed_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match from {
            Booked => &[Arrived, Cancelled, NoShow],
            Arrived => &[InConsultation, Cancelled, NoShow],
            InConsultation => &[Completed],
            Completed | Cancelled | NoShow => &[],
        }
    }

    pub fn validate_status_transition(
        &self,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", from, to);

        if Self::allowed_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(AppointmentError::InvalidStatusTransition { from, to })
        }
    }

    /// Only appointments nobody has acted on yet may move in time.
    pub fn validate_reschedulable(&self, status: AppointmentStatus) -> Result<(), AppointmentError> {
        if status == AppointmentStatus::Booked {
            Ok(())
        } else {
            Err(AppointmentError::InvalidStatusTransition {
                from: status,
                to: AppointmentStatus::Booked,
            })
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
