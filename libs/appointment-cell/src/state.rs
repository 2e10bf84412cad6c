use std::sync::Arc;

use tracing::info;

use doctor_cell::{
    DoctorDirectory, InMemoryDoctorDirectory, InMemoryScheduleCatalog, ScheduleCatalog,
    SupabaseDoctorDirectory, SupabaseScheduleCatalog,
};
use patient_cell::{InMemoryPatientDirectory, PatientDirectory, SupabasePatientDirectory};
use shared_config::{AppConfig, StoreBackend};

use crate::services::{AppointmentService, CheckinService};
use crate::store::{InMemorySchedulingStore, SchedulingStore, SupabaseSchedulingStore};

/// Shared handler state: the engine services plus the config the auth layer reads.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<AppointmentService>,
    pub checkins: Arc<CheckinService>,
}

impl AppointmentState {
    /// Wire the backend selected by `SCHEDULING_STORE`.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        match config.store_backend {
            StoreBackend::Supabase => {
                info!("Using Supabase scheduling store at {}", config.supabase_url);
                Self::new(
                    config.clone(),
                    Arc::new(SupabaseSchedulingStore::new(&config)),
                    Arc::new(SupabaseDoctorDirectory::new(&config)),
                    Arc::new(SupabaseScheduleCatalog::new(&config)),
                    Arc::new(SupabasePatientDirectory::new(&config)),
                )
            }
            StoreBackend::Memory => {
                info!("Using in-memory scheduling store; state is lost on restart");
                Self::new(
                    config,
                    Arc::new(InMemorySchedulingStore::new()),
                    Arc::new(InMemoryDoctorDirectory::new()),
                    Arc::new(InMemoryScheduleCatalog::new()),
                    Arc::new(InMemoryPatientDirectory::new()),
                )
            }
        }
    }

    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn SchedulingStore>,
        doctors: Arc<dyn DoctorDirectory>,
        schedules: Arc<dyn ScheduleCatalog>,
        patients: Arc<dyn PatientDirectory>,
    ) -> Self {
        let appointments = AppointmentService::new(
            &config,
            Arc::clone(&store),
            doctors,
            schedules,
            Arc::clone(&patients),
        );
        let checkins = CheckinService::new(&config, store, patients);

        Self {
            config,
            appointments: Arc::new(appointments),
            checkins: Arc::new(checkins),
        }
    }
}
