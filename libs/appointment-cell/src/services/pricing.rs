use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::DoctorProfile;

use crate::models::{AppointmentError, ConsultationType};
use crate::store::SchedulingStore;

/// Surcharge applied to walk-in and emergency consultations.
pub const URGENT_PREMIUM: f64 = 1.20;

/// The fee-relevant part of a doctor's profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub consultation_fee: Option<f64>,
    pub follow_up_fee: Option<f64>,
    pub follow_up_days: Option<i32>,
}

impl From<&DoctorProfile> for FeeSchedule {
    fn from(doctor: &DoctorProfile) -> Self {
        Self {
            consultation_fee: doctor.consultation_fee,
            follow_up_fee: doctor.follow_up_fee,
            follow_up_days: doctor.follow_up_days,
        }
    }
}

fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Fee for a consultation. `None` is a waived fee, not an unknown one.
///
/// A follow-up is free when the last completed visit lies within the
/// doctor's follow-up window, counted in whole days up to the new
/// appointment's scheduled start.
pub fn compute_fee(
    fees: &FeeSchedule,
    consultation_type: ConsultationType,
    last_completed_visit: Option<NaiveDateTime>,
    scheduled_start: NaiveDateTime,
) -> Option<f64> {
    match consultation_type {
        ConsultationType::New => fees.consultation_fee,
        ConsultationType::Followup => {
            let within_window = match (last_completed_visit, fees.follow_up_days) {
                (Some(last), Some(window)) => (scheduled_start - last).num_days() <= window as i64,
                _ => false,
            };
            if within_window {
                None
            } else {
                fees.follow_up_fee
            }
        }
        ConsultationType::Walkin | ConsultationType::Emergency => {
            fees.consultation_fee.map(|base| round_to_cents(base * URGENT_PREMIUM))
        }
    }
}

pub struct FeeCalculator {
    store: Arc<dyn SchedulingStore>,
}

impl FeeCalculator {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn compute(
        &self,
        doctor: &DoctorProfile,
        consultation_type: ConsultationType,
        patient_id: Uuid,
        scheduled_start: NaiveDateTime,
    ) -> Result<Option<f64>, AppointmentError> {
        let last_visit = match consultation_type {
            ConsultationType::Followup => self.store.last_completed_visit(patient_id, doctor.id).await?,
            _ => None,
        };

        let fee = compute_fee(&FeeSchedule::from(doctor), consultation_type, last_visit, scheduled_start);
        debug!(
            "Fee for {} consultation with doctor {}: {:?} (last completed visit {:?})",
            consultation_type.as_str(),
            doctor.id,
            fee,
            last_visit
        );
        Ok(fee)
    }
}
