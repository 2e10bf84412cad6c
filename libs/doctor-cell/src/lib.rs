pub mod memory;
pub mod models;
pub mod services;

pub use memory::{InMemoryDoctorDirectory, InMemoryScheduleCatalog};
pub use models::*;
pub use services::*;
