// libs/appointment-cell/src/services/checkin.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use patient_cell::PatientDirectory;
use shared_config::AppConfig;

use crate::models::{
    AppointmentError, AppointmentStatus, AppointmentValidationRules, CheckinQuery, CreateCheckinRequest,
    ListCheckinsParams, PatientCheckin, PatientVitals, RecordVitalsRequest, UpdateCheckinRequest,
    UpdateVitalsRequest, VitalsHistoryParams,
};
use crate::services::consistency::StoreGuard;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::validation::validate_vitals;
use crate::store::query::{page_limit, page_offset};
use crate::store::{
    CheckedInAppointment, CheckinUpdate, NewCheckin, NewVitals, SchedulingStore, StoreError, VitalsUpdate,
};

/// Front-desk arrival handling: check-in, check-in flags and vitals.
pub struct CheckinService {
    store: Arc<dyn SchedulingStore>,
    patients: Arc<dyn PatientDirectory>,
    lifecycle: AppointmentLifecycleService,
    guard: StoreGuard,
    validation_rules: AppointmentValidationRules,
}

impl CheckinService {
    pub fn new(config: &AppConfig, store: Arc<dyn SchedulingStore>, patients: Arc<dyn PatientDirectory>) -> Self {
        Self {
            store,
            patients,
            lifecycle: AppointmentLifecycleService::new(),
            guard: StoreGuard::from_config(config),
            validation_rules: AppointmentValidationRules::default(),
        }
    }

    /// Check a patient in. `checked_in_by` falls back to `caller_id`.
    #[instrument(skip(self, request), fields(appointment_id = %request.appointment_id))]
    pub async fn check_in(
        &self,
        request: CreateCheckinRequest,
        caller_id: Option<Uuid>,
    ) -> Result<CheckedInAppointment, AppointmentError> {
        let staff_id = request.checked_in_by.or(caller_id).ok_or_else(|| {
            AppointmentError::ValidationError("checked_in_by is required".to_string())
        })?;
        self.require_active_user(staff_id).await?;

        let appointment = self
            .guard
            .once("get_appointment", self.store.get_appointment(request.appointment_id))
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if self
            .guard
            .once("get_checkin", self.store.get_checkin(appointment.id))
            .await?
            .is_some()
        {
            return Err(AppointmentError::DuplicateCheckin);
        }
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Arrived)?;

        let draft = NewCheckin {
            appointment_id: appointment.id,
            checked_in_by: Some(staff_id),
            payment_collected: request.payment_collected.unwrap_or(false),
        };
        let checked_in = self
            .guard
            .retrying_write(
                "check_in_appointment",
                || self.store.check_in(draft.clone()),
                || self.committed_check_in(draft.appointment_id),
            )
            .await?;

        info!(
            "Checked in appointment {} ({}) by {}",
            checked_in.appointment.id, checked_in.appointment.booking_number, staff_id
        );
        Ok(checked_in)
    }

    /// The check-in, if an earlier attempt already recorded it.
    async fn committed_check_in(&self, appointment_id: Uuid) -> Result<Option<CheckedInAppointment>, StoreError> {
        let Some(checkin) = self.store.get_checkin(appointment_id).await? else {
            return Ok(None);
        };
        let appointment = self.store.get_appointment(appointment_id).await?;
        Ok(appointment
            .filter(|a| a.status == AppointmentStatus::Arrived)
            .map(|appointment| CheckedInAppointment { appointment, checkin }))
    }

    pub async fn list_checkins(&self, params: &ListCheckinsParams) -> Result<Vec<PatientCheckin>, AppointmentError> {
        let query = CheckinQuery::from_params(params, &self.validation_rules)?;
        debug!("Listing check-ins with {:?}", query);
        self.guard.once("list_checkins", self.store.list_checkins(&query)).await
    }

    pub async fn get_checkin(&self, appointment_id: Uuid) -> Result<PatientCheckin, AppointmentError> {
        self.guard
            .once("get_checkin", self.store.get_checkin(appointment_id))
            .await?
            .ok_or(AppointmentError::CheckinNotFound)
    }

    pub async fn update_checkin(
        &self,
        appointment_id: Uuid,
        request: UpdateCheckinRequest,
    ) -> Result<PatientCheckin, AppointmentError> {
        if request.vitals_recorded.is_none() && request.payment_collected.is_none() {
            return Err(AppointmentError::ValidationError(
                "Nothing to update: supply vitals_recorded or payment_collected".to_string(),
            ));
        }

        let update = CheckinUpdate {
            vitals_recorded: request.vitals_recorded,
            payment_collected: request.payment_collected,
        };
        self.guard
            .retrying("update_checkin", || self.store.update_checkin(appointment_id, update.clone()))
            .await
    }

    /// Record vitals. `recorded_by` falls back to `caller_id`.
    #[instrument(skip(self, request), fields(appointment_id = %request.appointment_id))]
    pub async fn record_vitals(
        &self,
        request: RecordVitalsRequest,
        caller_id: Option<Uuid>,
    ) -> Result<PatientVitals, AppointmentError> {
        validate_vitals(&request.signs())?;

        let recorder = request.recorded_by.or(caller_id).ok_or_else(|| {
            AppointmentError::ValidationError("recorded_by is required".to_string())
        })?;
        self.require_active_user(recorder).await?;

        if self
            .guard
            .once("get_appointment", self.store.get_appointment(request.appointment_id))
            .await?
            .is_none()
        {
            return Err(AppointmentError::NotFound);
        }

        let draft = NewVitals {
            appointment_id: request.appointment_id,
            recorded_by: recorder,
            bp_systolic: request.bp_systolic,
            bp_diastolic: request.bp_diastolic,
            temperature: request.temperature,
            pulse_rate: request.pulse_rate,
            height_cm: request.height_cm,
            weight_kg: request.weight_kg,
            notes: request.notes,
        };
        let vitals = self
            .guard
            .once("record_vitals", self.store.insert_vitals(draft))
            .await?;

        if let Err(e) = self
            .guard
            .once("mark_vitals_recorded", self.store.mark_vitals_recorded(vitals.appointment_id))
            .await
        {
            warn!("Could not flag vitals on check-in for {}: {}", vitals.appointment_id, e);
        }

        Ok(vitals)
    }

    pub async fn get_vitals(&self, appointment_id: Uuid) -> Result<PatientVitals, AppointmentError> {
        self.guard
            .once("get_vitals", self.store.get_vitals(appointment_id))
            .await?
            .ok_or(AppointmentError::VitalsNotFound)
    }

    /// Overwrite the supplied fields of a reading. The merged reading must
    /// pass the same checks as a new one.
    #[instrument(skip(self, request))]
    pub async fn update_vitals(
        &self,
        vitals_id: Uuid,
        request: UpdateVitalsRequest,
    ) -> Result<PatientVitals, AppointmentError> {
        let changes = request.signs();
        if changes.is_empty() && request.notes.is_none() {
            return Err(AppointmentError::ValidationError("Nothing to update".to_string()));
        }

        let existing = self
            .guard
            .once("get_vitals", self.store.get_vitals_by_id(vitals_id))
            .await?
            .ok_or(AppointmentError::VitalsNotFound)?;
        validate_vitals(&existing.signs().overlay(changes))?;

        let update = VitalsUpdate {
            bp_systolic: changes.bp_systolic,
            bp_diastolic: changes.bp_diastolic,
            temperature: changes.temperature,
            pulse_rate: changes.pulse_rate,
            height_cm: changes.height_cm,
            weight_kg: changes.weight_kg,
            notes: request.notes,
        };
        let vitals = self
            .guard
            .retrying("update_vitals", || self.store.update_vitals(vitals_id, update.clone()))
            .await?;
        info!("Updated vitals {} for appointment {}", vitals.id, vitals.appointment_id);
        Ok(vitals)
    }

    /// A patient's readings across visits, newest first.
    pub async fn vitals_history(
        &self,
        patient_id: Uuid,
        params: &VitalsHistoryParams,
    ) -> Result<Vec<PatientVitals>, AppointmentError> {
        let limit = page_limit(
            params.limit,
            self.validation_rules.default_history_size,
            self.validation_rules.max_page_size,
        );
        let offset = page_offset(params.offset);
        self.guard
            .once("vitals_history", self.store.vitals_for_patient(patient_id, limit, offset))
            .await
    }

    async fn require_active_user(&self, user_id: Uuid) -> Result<(), AppointmentError> {
        if self.patients.user_is_active(user_id).await? {
            Ok(())
        } else {
            Err(AppointmentError::UserNotFound)
        }
    }
}
