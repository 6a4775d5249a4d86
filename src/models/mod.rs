pub mod course;
pub mod schedule;
pub mod sync_state;

pub use course::{CatalogRecord, Course, CourseFilter};
pub use schedule::{EnrollmentRow, EnrollmentStatus, ScheduleEntry, WeekdaySection};
pub use sync_state::{SyncOutcome, SyncReport, SyncState, SyncStatus};
