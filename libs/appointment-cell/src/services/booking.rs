// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::{DoctorDirectory, ScheduleCatalog};
use patient_cell::{resolve_patient, PatientDirectory};
use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, AppointmentValidationRules,
    CancelAppointmentRequest, ConsultationType, CreateAppointmentRequest, CreateAppointmentResponse,
    ListAppointmentsParams, PatientCheckin, PaymentMode, PaymentStatus, QueueEntry, RescheduleAppointmentRequest,
    TimeSlot, UpdateStatusRequest,
};
use crate::services::availability::AvailabilityChecker;
use crate::services::consistency::StoreGuard;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::pricing::FeeCalculator;
use crate::services::queue::QueueService;
use crate::services::slots::SlotGenerator;
use crate::services::validation::{parse_appointment_time, parse_date, resolve_duration};
use crate::store::{NewAppointment, NewCheckin, SchedulingStore, StatusChange, StoreError};

/// Create, reschedule, cancel and move appointments through their lifecycle.
///
/// Every committing write is one atomic store call. The availability check
/// done here is a pre-check that turns the common conflict into a clean
/// rejection; the store repeats it under its own lock.
pub struct AppointmentService {
    store: Arc<dyn SchedulingStore>,
    doctors: Arc<dyn DoctorDirectory>,
    patients: Arc<dyn PatientDirectory>,
    availability: AvailabilityChecker,
    pricing: FeeCalculator,
    slots: SlotGenerator,
    queue: QueueService,
    lifecycle: AppointmentLifecycleService,
    guard: StoreGuard,
    validation_rules: AppointmentValidationRules,
}

/// Fields of a create request after parsing.
struct ValidatedBooking {
    appointment_date: NaiveDate,
    appointment_time: NaiveDateTime,
    duration_minutes: i32,
    consultation_type: ConsultationType,
    payment_mode: Option<PaymentMode>,
}

impl AppointmentService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn SchedulingStore>,
        doctors: Arc<dyn DoctorDirectory>,
        schedules: Arc<dyn ScheduleCatalog>,
        patients: Arc<dyn PatientDirectory>,
    ) -> Self {
        Self {
            availability: AvailabilityChecker::new(Arc::clone(&store)),
            pricing: FeeCalculator::new(Arc::clone(&store)),
            slots: SlotGenerator::new(schedules, Arc::clone(&store)),
            queue: QueueService::new(Arc::clone(&store)),
            lifecycle: AppointmentLifecycleService::new(),
            guard: StoreGuard::from_config(config),
            validation_rules: AppointmentValidationRules::default(),
            store,
            doctors,
            patients,
        }
    }

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, clinic_id = %request.clinic_id))]
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<CreateAppointmentResponse, AppointmentError> {
        let booking = self.validate_create_request(&request)?;

        let clinic = self.doctors.active_clinic(request.clinic_id).await?;
        let doctor = self.doctors.active_doctor(request.doctor_id).await?;
        if doctor.clinic_id != clinic.id {
            return Err(AppointmentError::ValidationError(format!(
                "Doctor {} does not practise at clinic {}",
                doctor.id, clinic.id
            )));
        }

        let patient = resolve_patient(
            self.patients.as_ref(),
            request.patient_id,
            request.user_id,
            clinic.id,
        )
        .await?;

        let available = self
            .availability
            .is_available(doctor.id, booking.appointment_time, Some(booking.duration_minutes), None)
            .await?;
        if !available {
            info!("Doctor {} unavailable at {}", doctor.id, booking.appointment_time);
            return Err(AppointmentError::DoctorNotAvailable);
        }

        let fee_amount = self
            .pricing
            .compute(&doctor, booking.consultation_type, patient.patient_id, booking.appointment_time)
            .await?;

        let scope_code = self.doctors.scope_code(&doctor).await?.ok_or_else(|| {
            AppointmentError::ValidationError(
                "Neither the doctor nor the clinic has a code to number bookings with".to_string(),
            )
        })?;

        let payment_status = if booking.payment_mode.is_some() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        };

        let draft = NewAppointment {
            id: Uuid::new_v4(),
            patient_id: patient.patient_id,
            clinic_id: clinic.id,
            doctor_id: doctor.id,
            department_id: request.department_id,
            scope_code,
            appointment_date: booking.appointment_date,
            appointment_time: booking.appointment_time,
            duration_minutes: booking.duration_minutes,
            consultation_type: booking.consultation_type,
            reason: request.reason,
            notes: request.notes,
            fee_amount,
            payment_status,
            payment_mode: booking.payment_mode,
            is_priority: request.is_priority.unwrap_or(false),
        };

        let appointment = self
            .guard
            .retrying_write(
                "book_appointment",
                || self.store.insert_booking(draft.clone()),
                || self.store.get_appointment(draft.id),
            )
            .await?;

        info!(
            "Booked appointment {} ({}) for patient {} with doctor {} at {}",
            appointment.id, appointment.booking_number, appointment.patient_id, doctor.id, appointment.appointment_time
        );

        let checkin = if booking.payment_mode.is_some() {
            self.auto_check_in(appointment.id).await
        } else {
            None
        };

        Ok(CreateAppointmentResponse {
            appointment,
            patient_created: patient.created,
            checkin,
        })
    }

    /// Payment taken at booking records a check-in. The booking stands even if
    /// this fails; the desk can check the patient in later.
    async fn auto_check_in(&self, appointment_id: Uuid) -> Option<PatientCheckin> {
        let draft = NewCheckin {
            appointment_id,
            checked_in_by: None,
            payment_collected: true,
        };
        match self.guard.once("auto_check_in", self.store.create_checkin(draft)).await {
            Ok(checkin) => Some(checkin),
            Err(e) => {
                warn!("Auto check-in for appointment {} failed: {}", appointment_id, e);
                None
            }
        }
    }

    fn validate_create_request(&self, request: &CreateAppointmentRequest) -> Result<ValidatedBooking, AppointmentError> {
        if request.patient_id.is_some() == request.user_id.is_some() {
            return Err(AppointmentError::ValidationError(
                "Exactly one of patient_id or user_id is required".to_string(),
            ));
        }

        let appointment_date = parse_date(&request.appointment_date)?;
        let appointment_time = parse_appointment_time(&request.appointment_time)?;
        if appointment_time.date() != appointment_date {
            return Err(AppointmentError::ValidationError(format!(
                "appointment_date {} does not match appointment_time {}",
                appointment_date, appointment_time
            )));
        }

        let duration_minutes = resolve_duration(request.duration_minutes, &self.validation_rules)?;
        let consultation_type = request.consultation_type.trim().parse::<ConsultationType>()?;
        let payment_mode = request
            .payment_mode
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::parse::<PaymentMode>)
            .transpose()?;

        Ok(ValidatedBooking {
            appointment_date,
            appointment_time,
            duration_minutes,
            consultation_type,
            payment_mode,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let new_time = parse_appointment_time(&request.new_appointment_time)?;
        let current = self.require_appointment(appointment_id).await?;
        self.lifecycle.validate_reschedulable(current.status)?;

        let available = self
            .availability
            .is_available(current.doctor_id, new_time, Some(current.duration_minutes), Some(current.id))
            .await?;
        if !available {
            return Err(AppointmentError::DoctorNotAvailable);
        }

        let updated = self
            .guard
            .retrying("reschedule_appointment", || self.store.reschedule(appointment_id, new_time))
            .await?;

        info!(
            "Rescheduled appointment {} ({}) from {} to {}; reason: {}",
            updated.id,
            updated.booking_number,
            current.appointment_time,
            updated.appointment_time,
            request.reason.as_deref().unwrap_or("none given")
        );
        Ok(updated)
    }

    #[instrument(skip(self, request))]
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::ValidationError("A cancellation reason is required".to_string()));
        }

        let appointment = self
            .transition(appointment_id, AppointmentStatus::Cancelled, Some(reason.to_string()))
            .await?;
        info!("Cancelled appointment {} ({}): {}", appointment.id, appointment.booking_number, reason);
        Ok(appointment)
    }

    #[instrument(skip(self, request))]
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<Appointment, AppointmentError> {
        let next = request.status.trim().parse::<AppointmentStatus>()?;
        self.transition(appointment_id, next, None).await
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        next: AppointmentStatus,
        cancellation_reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.require_appointment(appointment_id).await?;
        self.lifecycle.validate_status_transition(current.status, next)?;

        let change = StatusChange {
            appointment_id,
            expected: current.status,
            next,
            cancellation_reason,
        };
        let updated = self
            .guard
            .retrying_write(
                "transition_appointment",
                || self.store.transition_status(change.clone()),
                || self.committed_transition(appointment_id, next),
            )
            .await?;

        debug!("Appointment {} moved {} -> {}", appointment_id, current.status, updated.status);
        Ok(updated)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.require_appointment(appointment_id).await
    }

    pub async fn list_appointments(&self, params: &ListAppointmentsParams) -> Result<Vec<Appointment>, AppointmentError> {
        let query = AppointmentQuery::from_params(params, &self.validation_rules)?;
        debug!("Listing appointments with {:?}", query);
        self.guard.once("list_appointments", self.store.list_appointments(&query)).await
    }

    pub async fn available_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<TimeSlot>, AppointmentError> {
        self.slots.generate(doctor_id, date).await
    }

    pub async fn doctor_queue(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<QueueEntry>, AppointmentError> {
        self.queue.doctor_queue(doctor_id, date).await
    }

    /// The appointment, if an earlier attempt already moved it to `next`.
    async fn committed_transition(
        &self,
        appointment_id: Uuid,
        next: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        let current = self.store.get_appointment(appointment_id).await?;
        Ok(current.filter(|a| a.status == next))
    }

    async fn require_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.guard
            .once("get_appointment", self.store.get_appointment(appointment_id))
            .await?
            .ok_or(AppointmentError::NotFound)
    }
}
