use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::models::Course;

#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentRow {
    pub id: i64,
    pub added_at: DateTime<Utc>,
}

/// One "my schedule" entry. `course` is `None` when the last sync dropped the
/// referenced course.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    pub course_id: i64,
    pub added_at: DateTime<Utc>,
    pub course: Option<Course>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekdaySection {
    pub day: String,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentStatus {
    pub course_id: i64,
    pub enrolled: bool,
}
