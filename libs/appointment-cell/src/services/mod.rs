pub mod availability;
pub mod booking;
pub mod booking_number;
pub mod checkin;
pub mod consistency;
pub mod lifecycle;
pub mod pricing;
pub mod queue;
pub mod slots;
pub mod validation;

pub use availability::AvailabilityChecker;
pub use booking::AppointmentService;
pub use checkin::CheckinService;
pub use consistency::StoreGuard;
pub use lifecycle::AppointmentLifecycleService;
pub use pricing::FeeCalculator;
pub use queue::QueueService;
pub use slots::SlotGenerator;
