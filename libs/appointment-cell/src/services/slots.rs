use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::{DoctorSchedule, ScheduleCatalog};

use crate::models::{Appointment, AppointmentError, TimeSlot};
use crate::store::SchedulingStore;

/// Candidate slots for `date` from the doctor's schedule rows. A slot is
/// produced only if it ends at or before its window closes, and is booked
/// when an active appointment starts exactly at the slot start.
pub fn generate_slots(date: NaiveDate, schedules: &[DoctorSchedule], appointments: &[Appointment]) -> Vec<TimeSlot> {
    let booked_starts: HashMap<NaiveDateTime, Uuid> = appointments
        .iter()
        .filter(|a| a.is_active())
        .map(|a| (a.appointment_time, a.id))
        .collect();

    let mut slots = Vec::new();

    for schedule in schedules.iter().filter(|s| s.is_active) {
        if schedule.slot_duration_minutes <= 0 {
            warn!(
                "Schedule {} has non-positive slot duration {}, skipping",
                schedule.id, schedule.slot_duration_minutes
            );
            continue;
        }

        let step = Duration::minutes(schedule.slot_duration_minutes as i64);
        let window_end = date.and_time(schedule.end_time);
        let mut current = date.and_time(schedule.start_time);

        while current + step <= window_end {
            let appointment_id = booked_starts.get(&current).copied();
            slots.push(TimeSlot {
                start_time: current,
                end_time: current + step,
                is_booked: appointment_id.is_some(),
                appointment_id,
            });
            current += step;
        }
    }

    slots.sort_by_key(|s| s.start_time);
    slots
}

pub struct SlotGenerator {
    schedules: Arc<dyn ScheduleCatalog>,
    store: Arc<dyn SchedulingStore>,
}

impl SlotGenerator {
    pub fn new(schedules: Arc<dyn ScheduleCatalog>, store: Arc<dyn SchedulingStore>) -> Self {
        Self { schedules, store }
    }

    pub async fn generate(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<TimeSlot>, AppointmentError> {
        let day_of_week = date.weekday().number_from_monday();

        let (schedules, appointments) = futures::try_join!(
            async {
                self.schedules
                    .schedules_for_day(doctor_id, day_of_week)
                    .await
                    .map_err(AppointmentError::from)
            },
            async {
                self.store
                    .appointments_for_doctor_on(doctor_id, date)
                    .await
                    .map_err(AppointmentError::from)
            },
        )?;

        let slots = generate_slots(date, &schedules, &appointments);
        debug!(
            "Generated {} slots for doctor {} on {} from {} schedule rows",
            slots.len(),
            doctor_id,
            date,
            schedules.len()
        );
        Ok(slots)
    }
}
