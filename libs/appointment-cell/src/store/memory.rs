use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, CheckinQuery, PatientCheckin, PatientVitals, PaymentStatus,
};
use crate::services::availability::find_overlap;
use crate::services::booking_number::{booking_prefix, format_booking_number, next_serial};
use crate::store::{
    CheckedInAppointment, CheckinUpdate, NewAppointment, NewCheckin, NewVitals, SchedulingStore,
    StatusChange, StoreError, VitalsUpdate,
};

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    /// Keyed by appointment id.
    checkins: HashMap<Uuid, PatientCheckin>,
    /// Keyed by appointment id.
    vitals: HashMap<Uuid, PatientVitals>,
    serials: HashMap<(String, NaiveDate), u32>,
}

/// Process-local store. Each atomic operation holds the write lock for its
/// whole read-check-write sequence and never awaits inside it.
#[derive(Default)]
pub struct InMemorySchedulingStore {
    tables: RwLock<Tables>,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row as-is, e.g. a historical visit.
    pub async fn seed_appointment(&self, appointment: Appointment) {
        self.tables.write().await.appointments.insert(appointment.id, appointment);
    }

    pub async fn all_appointments(&self) -> Vec<Appointment> {
        self.tables.read().await.appointments.values().cloned().collect()
    }
}

#[async_trait]
impl SchedulingStore for InMemorySchedulingStore {
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.appointment_time
                .cmp(&a.appointment_time)
                .then_with(|| a.booking_number.cmp(&b.booking_number))
        });
        Ok(rows.into_iter().skip(query.offset).take(query.limit).collect())
    }

    async fn active_appointments_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.is_active())
            .filter(|a| a.appointment_time >= from && a.appointment_time < to)
            .cloned()
            .collect())
    }

    async fn appointments_for_doctor_on(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.appointment_date == date)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.appointment_time);
        Ok(rows)
    }

    async fn last_completed_visit(&self, patient_id: Uuid, doctor_id: Uuid) -> Result<Option<NaiveDateTime>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .appointments
            .values()
            .filter(|a| {
                a.patient_id == patient_id && a.doctor_id == doctor_id && a.status == AppointmentStatus::Completed
            })
            .map(|a| a.appointment_time)
            .max())
    }

    async fn insert_booking(&self, draft: NewAppointment) -> Result<Appointment, StoreError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        if let Some(existing) = tables.appointments.get(&draft.id) {
            debug!("Booking {} already stored as {}", draft.id, existing.booking_number);
            return Ok(existing.clone());
        }

        let doctor_rows = tables.appointments.values().filter(|a| a.doctor_id == draft.doctor_id);
        if find_overlap(doctor_rows, draft.appointment_time, draft.duration_minutes, None).is_some() {
            return Err(StoreError::Overlap);
        }

        let service_date = draft.appointment_time.date();
        let key = (draft.scope_code.clone(), service_date);
        let from_rows = next_serial(
            tables.appointments.values().map(|a| a.booking_number.as_str()),
            &draft.scope_code,
            service_date,
        );
        let from_counter = tables.serials.get(&key).copied().unwrap_or(0) + 1;
        let serial = from_rows.max(from_counter);

        let booking_number = format_booking_number(&draft.scope_code, service_date, serial)
            .ok_or_else(|| StoreError::SerialExhausted(booking_prefix(&draft.scope_code, service_date)))?;

        let now = Utc::now();
        let appointment = Appointment {
            id: draft.id,
            booking_number,
            patient_id: draft.patient_id,
            clinic_id: draft.clinic_id,
            doctor_id: draft.doctor_id,
            department_id: draft.department_id,
            appointment_date: draft.appointment_date,
            appointment_time: draft.appointment_time,
            duration_minutes: draft.duration_minutes,
            consultation_type: draft.consultation_type,
            reason: draft.reason,
            notes: draft.notes,
            status: AppointmentStatus::Booked,
            fee_amount: draft.fee_amount,
            payment_status: draft.payment_status,
            payment_mode: draft.payment_mode,
            is_priority: draft.is_priority,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        tables.serials.insert(key, serial);
        tables.appointments.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {} as {}", appointment.id, appointment.booking_number);

        Ok(appointment)
    }

    async fn reschedule(&self, appointment_id: Uuid, new_time: NaiveDateTime) -> Result<Appointment, StoreError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let current = tables.appointments.get(&appointment_id).ok_or(StoreError::NotFound)?;
        if current.status != AppointmentStatus::Booked {
            return Err(StoreError::StatusMismatch { current: current.status });
        }
        let (doctor_id, duration) = (current.doctor_id, current.duration_minutes);

        let doctor_rows = tables.appointments.values().filter(|a| a.doctor_id == doctor_id);
        if find_overlap(doctor_rows, new_time, duration, Some(appointment_id)).is_some() {
            return Err(StoreError::Overlap);
        }

        let appointment = tables.appointments.get_mut(&appointment_id).ok_or(StoreError::NotFound)?;
        appointment.appointment_time = new_time;
        appointment.appointment_date = new_time.date();
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn transition_status(&self, change: StatusChange) -> Result<Appointment, StoreError> {
        let mut tables = self.tables.write().await;
        let appointment = tables
            .appointments
            .get_mut(&change.appointment_id)
            .ok_or(StoreError::NotFound)?;

        if appointment.status != change.expected {
            return Err(StoreError::StatusMismatch { current: appointment.status });
        }

        appointment.status = change.next;
        if change.next == AppointmentStatus::Cancelled {
            appointment.cancellation_reason = change.cancellation_reason;
        }
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn get_checkin(&self, appointment_id: Uuid) -> Result<Option<PatientCheckin>, StoreError> {
        Ok(self.tables.read().await.checkins.get(&appointment_id).cloned())
    }

    async fn checkins_for(&self, appointment_ids: &[Uuid]) -> Result<Vec<PatientCheckin>, StoreError> {
        let tables = self.tables.read().await;
        Ok(appointment_ids
            .iter()
            .filter_map(|id| tables.checkins.get(id).cloned())
            .collect())
    }

    async fn list_checkins(&self, query: &CheckinQuery) -> Result<Vec<PatientCheckin>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<PatientCheckin> = tables
            .checkins
            .values()
            .filter(|c| query.matches(c, tables.appointments.get(&c.appointment_id)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.checkin_time.cmp(&a.checkin_time));
        Ok(rows.into_iter().skip(query.offset).take(query.limit).collect())
    }

    async fn create_checkin(&self, draft: NewCheckin) -> Result<PatientCheckin, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.appointments.contains_key(&draft.appointment_id) {
            return Err(StoreError::NotFound);
        }
        if tables.checkins.contains_key(&draft.appointment_id) {
            return Err(StoreError::DuplicateCheckin);
        }

        let checkin = new_checkin_row(&draft);
        tables.checkins.insert(draft.appointment_id, checkin.clone());
        Ok(checkin)
    }

    async fn check_in(&self, draft: NewCheckin) -> Result<CheckedInAppointment, StoreError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let appointment = tables
            .appointments
            .get_mut(&draft.appointment_id)
            .ok_or(StoreError::NotFound)?;
        if tables.checkins.contains_key(&draft.appointment_id) {
            return Err(StoreError::DuplicateCheckin);
        }
        if appointment.status != AppointmentStatus::Booked {
            return Err(StoreError::StatusMismatch { current: appointment.status });
        }

        appointment.status = AppointmentStatus::Arrived;
        if draft.payment_collected {
            appointment.payment_status = PaymentStatus::Paid;
        }
        appointment.updated_at = Utc::now();

        let checkin = new_checkin_row(&draft);
        tables.checkins.insert(draft.appointment_id, checkin.clone());

        Ok(CheckedInAppointment {
            appointment: appointment.clone(),
            checkin,
        })
    }

    async fn update_checkin(&self, appointment_id: Uuid, update: CheckinUpdate) -> Result<PatientCheckin, StoreError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let checkin = tables.checkins.get_mut(&appointment_id).ok_or(StoreError::CheckinNotFound)?;
        if let Some(vitals) = update.vitals_recorded {
            checkin.vitals_recorded = vitals;
        }
        if let Some(paid) = update.payment_collected {
            checkin.payment_collected = paid;
            if paid {
                if let Some(appointment) = tables.appointments.get_mut(&appointment_id) {
                    appointment.payment_status = PaymentStatus::Paid;
                    appointment.updated_at = Utc::now();
                }
            }
        }
        Ok(checkin.clone())
    }

    async fn insert_vitals(&self, draft: NewVitals) -> Result<PatientVitals, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.appointments.contains_key(&draft.appointment_id) {
            return Err(StoreError::NotFound);
        }
        if tables.vitals.contains_key(&draft.appointment_id) {
            return Err(StoreError::DuplicateVitals);
        }

        let vitals = PatientVitals {
            id: Uuid::new_v4(),
            appointment_id: draft.appointment_id,
            recorded_by: draft.recorded_by,
            bp_systolic: draft.bp_systolic,
            bp_diastolic: draft.bp_diastolic,
            temperature: draft.temperature,
            pulse_rate: draft.pulse_rate,
            height_cm: draft.height_cm,
            weight_kg: draft.weight_kg,
            notes: draft.notes,
            recorded_at: Utc::now(),
        };
        tables.vitals.insert(vitals.appointment_id, vitals.clone());
        Ok(vitals)
    }

    async fn mark_vitals_recorded(&self, appointment_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let checkin = tables.checkins.get_mut(&appointment_id).ok_or(StoreError::CheckinNotFound)?;
        checkin.vitals_recorded = true;
        Ok(())
    }

    async fn get_vitals(&self, appointment_id: Uuid) -> Result<Option<PatientVitals>, StoreError> {
        Ok(self.tables.read().await.vitals.get(&appointment_id).cloned())
    }

    async fn get_vitals_by_id(&self, vitals_id: Uuid) -> Result<Option<PatientVitals>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.vitals.values().find(|v| v.id == vitals_id).cloned())
    }

    async fn update_vitals(&self, vitals_id: Uuid, update: VitalsUpdate) -> Result<PatientVitals, StoreError> {
        let mut tables = self.tables.write().await;
        let vitals = tables
            .vitals
            .values_mut()
            .find(|v| v.id == vitals_id)
            .ok_or(StoreError::VitalsNotFound)?;

        if update.bp_systolic.is_some() {
            vitals.bp_systolic = update.bp_systolic;
        }
        if update.bp_diastolic.is_some() {
            vitals.bp_diastolic = update.bp_diastolic;
        }
        if update.temperature.is_some() {
            vitals.temperature = update.temperature;
        }
        if update.pulse_rate.is_some() {
            vitals.pulse_rate = update.pulse_rate;
        }
        if update.height_cm.is_some() {
            vitals.height_cm = update.height_cm;
        }
        if update.weight_kg.is_some() {
            vitals.weight_kg = update.weight_kg;
        }
        if update.notes.is_some() {
            vitals.notes = update.notes;
        }
        Ok(vitals.clone())
    }

    async fn vitals_for_patient(
        &self,
        patient_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PatientVitals>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<PatientVitals> = tables
            .vitals
            .values()
            .filter(|v| {
                tables
                    .appointments
                    .get(&v.appointment_id)
                    .map_or(false, |a| a.patient_id == patient_id)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

fn new_checkin_row(draft: &NewCheckin) -> PatientCheckin {
    let now = Utc::now();
    PatientCheckin {
        id: Uuid::new_v4(),
        appointment_id: draft.appointment_id,
        checkin_time: now,
        checked_in_by: draft.checked_in_by,
        vitals_recorded: false,
        payment_collected: draft.payment_collected,
        created_at: now,
    }
}
