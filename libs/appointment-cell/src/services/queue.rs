use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, PatientCheckin, QueueEntry};
use crate::store::SchedulingStore;

/// Waiting order: priority patients first, then by check-in time, with the
/// booking number breaking exact ties.
pub fn order_queue(appointments: Vec<Appointment>, checkins: Vec<PatientCheckin>) -> Vec<QueueEntry> {
    let mut by_appointment: HashMap<Uuid, PatientCheckin> =
        checkins.into_iter().map(|c| (c.appointment_id, c)).collect();

    let mut waiting: Vec<(Appointment, PatientCheckin)> = appointments
        .into_iter()
        .filter(|a| matches!(a.status, AppointmentStatus::Arrived | AppointmentStatus::InConsultation))
        .filter_map(|a| by_appointment.remove(&a.id).map(|c| (a, c)))
        .collect();

    waiting.sort_by(|(a1, c1), (a2, c2)| {
        a2.is_priority
            .cmp(&a1.is_priority)
            .then_with(|| c1.checkin_time.cmp(&c2.checkin_time))
            .then_with(|| a1.booking_number.cmp(&a2.booking_number))
    });

    waiting
        .into_iter()
        .enumerate()
        .map(|(i, (appointment, checkin))| QueueEntry {
            position: i + 1,
            appointment_id: appointment.id,
            booking_number: appointment.booking_number,
            patient_id: appointment.patient_id,
            status: appointment.status,
            is_priority: appointment.is_priority,
            checkin_time: checkin.checkin_time,
            appointment_time: appointment.appointment_time,
        })
        .collect()
}

/// Recomputes the doctor's queue from current appointment and check-in state.
pub struct QueueService {
    store: Arc<dyn SchedulingStore>,
}

impl QueueService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn doctor_queue(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<QueueEntry>, AppointmentError> {
        let appointments: Vec<Appointment> = self
            .store
            .appointments_for_doctor_on(doctor_id, date)
            .await?
            .into_iter()
            .filter(|a| matches!(a.status, AppointmentStatus::Arrived | AppointmentStatus::InConsultation))
            .collect();

        if appointments.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = appointments.iter().map(|a| a.id).collect();
        let checkins = self.store.checkins_for(&ids).await?;

        let queue = order_queue(appointments, checkins);
        debug!("Doctor {} has {} patients waiting on {}", doctor_id, queue.len(), date);
        Ok(queue)
    }
}
