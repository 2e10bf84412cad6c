pub mod memory;
pub mod models;
pub mod services;

pub use memory::InMemoryPatientDirectory;
pub use models::*;
pub use services::*;
