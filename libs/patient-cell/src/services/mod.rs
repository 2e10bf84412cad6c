pub mod directory;
pub mod resolution;

pub use directory::{PatientDirectory, SupabasePatientDirectory};
pub use resolution::resolve_patient;
