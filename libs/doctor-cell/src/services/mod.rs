pub mod directory;
pub mod schedule;

pub use directory::{DoctorDirectory, SupabaseDoctorDirectory};
pub use schedule::{validate_new_schedule, ScheduleCatalog, SupabaseScheduleCatalog};
