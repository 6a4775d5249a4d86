use std::collections::HashMap;

use chrono::{Utc, Weekday};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{ScheduleEntry, WeekdaySection};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// The user's "my schedule" list, kept on the primary scope.
///
/// Every mutation is a single autocommitted statement, so a returned `Ok`
/// means the change is durable.
#[derive(Clone)]
pub struct EnrollmentStore {
    db: SqlitePool,
}

impl EnrollmentStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn is_enrolled(&self, course_id: i64) -> Result<bool, AppError> {
        Ok(repository::is_enrolled(&self.db, course_id).await?)
    }

    pub async fn enroll(&self, course_id: i64) -> Result<(), AppError> {
        if repository::insert_enrollment(&self.db, course_id, Utc::now()).await? {
            info!("Added course {} to schedule", course_id);
        } else {
            debug!("Course {} already in schedule", course_id);
        }
        Ok(())
    }

    /// Returns whether an entry was removed.
    pub async fn unenroll(&self, course_id: i64) -> Result<bool, AppError> {
        let removed = repository::delete_enrollment(&self.db, course_id).await?;
        if removed {
            info!("Removed course {} from schedule", course_id);
        }
        Ok(removed)
    }

    pub async fn schedule(&self) -> Result<Vec<ScheduleEntry>, AppError> {
        let entries = repository::fetch_enrollments(&self.db).await?;
        let mut courses: HashMap<i64, _> = repository::fetch_enrolled_courses(&self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        Ok(entries
            .into_iter()
            .map(|entry| ScheduleEntry {
                course_id: entry.id,
                added_at: entry.added_at,
                course: courses.remove(&entry.id),
            })
            .collect())
    }

    /// Enrolled courses grouped by meeting day, Monday first. Days without a
    /// course are left out; courses without a meeting pattern appear nowhere.
    pub async fn weekly_schedule(&self) -> Result<Vec<WeekdaySection>, AppError> {
        let courses = repository::fetch_enrolled_courses(&self.db).await?;

        Ok(WEEK
            .iter()
            .filter_map(|day| {
                let on_day: Vec<_> = courses
                    .iter()
                    .filter(|c| c.meeting_days().contains(day))
                    .cloned()
                    .collect();
                (!on_day.is_empty()).then(|| WeekdaySection {
                    day: weekday_name(*day).to_string(),
                    courses: on_day,
                })
            })
            .collect())
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
