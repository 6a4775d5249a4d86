pub mod enrollment;
pub mod orchestrator;
pub mod scheduler;

pub use enrollment::EnrollmentStore;
pub use orchestrator::{DownloadConsent, Preapproved, SyncOrchestrator, same_calendar_day};
pub use scheduler::SyncScheduler;
