use chrono::Weekday;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub subject: Option<String>,
    pub catalog_number: Option<String>,
    pub section: Option<String>,
    pub description: Option<String>,
    pub meeting_pattern: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub component: Option<String>,
    pub units: Option<f64>,
    pub combined_section: Option<String>,
    pub designation: Option<String>,
    pub facility_id: Option<String>,
    pub instructor_first_name: Option<String>,
    pub instructor_last_name: Option<String>,
}

impl Course {
    /// Course with only its id set; every other field is empty.
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            subject: None,
            catalog_number: None,
            section: None,
            description: None,
            meeting_pattern: None,
            start_time: None,
            end_time: None,
            component: None,
            units: None,
            combined_section: None,
            designation: None,
            facility_id: None,
            instructor_first_name: None,
            instructor_last_name: None,
        }
    }

    /// Weekdays encoded in the meeting pattern, Monday first.
    ///
    /// Letters follow the registrar convention: `M T W R F S U`, where `R` is
    /// Thursday and `U` is Sunday. Unknown letters are ignored.
    pub fn meeting_days(&self) -> Vec<Weekday> {
        let Some(pattern) = self.meeting_pattern.as_deref() else {
            return Vec::new();
        };

        let mut days: Vec<Weekday> = pattern
            .chars()
            .filter_map(|c| match c.to_ascii_uppercase() {
                'M' => Some(Weekday::Mon),
                'T' => Some(Weekday::Tue),
                'W' => Some(Weekday::Wed),
                'R' => Some(Weekday::Thu),
                'F' => Some(Weekday::Fri),
                'S' => Some(Weekday::Sat),
                'U' => Some(Weekday::Sun),
                _ => None,
            })
            .collect();
        days.sort_by_key(|d| d.num_days_from_monday());
        days.dedup();
        days
    }
}

/// Entities a catalog page can yield. Staging dispatches on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRecord {
    Course(Course),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseFilter {
    pub subject: Option<String>,
    pub search: Option<String>,
}
