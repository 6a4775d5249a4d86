use async_trait::async_trait;
use serde::Deserialize;

use crate::catalog::{CatalogPage, dto};
use crate::db::ChildScope;
use crate::error::AppError;
use crate::models::{CatalogRecord, Course};

/// Turns catalog pages into typed records and stages them in a child scope.
#[async_trait]
pub trait RecordBuilder: Send + Sync {
    fn parse_page(&self, page: &CatalogPage) -> Result<Vec<CatalogRecord>, AppError>;

    async fn commit(&self, records: Vec<CatalogRecord>, scope: &mut ChildScope) -> Result<usize, AppError> {
        scope.stage(records).await
    }
}

/// Builds [`Course`] records from the catalog's JSON objects.
///
/// A record that does not decode fails the whole page with
/// [`AppError::Decode`], so a drifted payload never reaches the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCourseBuilder;

impl JsonCourseBuilder {
    fn course_from_record(record: dto::CourseRecord) -> Course {
        Course {
            id: record.id,
            subject: record.subject,
            catalog_number: record.catalog_number,
            section: record.section,
            description: record.description,
            meeting_pattern: record.meeting_pattern,
            start_time: record.start_time,
            end_time: record.end_time,
            component: record.component,
            units: record.units,
            combined_section: record.combined_section,
            designation: record.designation,
            facility_id: record.facility_id,
            instructor_first_name: record.instructor_first_name,
            instructor_last_name: record.instructor_last_name,
        }
    }
}

#[async_trait]
impl RecordBuilder for JsonCourseBuilder {
    fn parse_page(&self, page: &CatalogPage) -> Result<Vec<CatalogRecord>, AppError> {
        page.records
            .iter()
            .enumerate()
            .map(|(index, value)| {
                dto::CourseRecord::deserialize(value)
                    .map(|record| CatalogRecord::Course(Self::course_from_record(record)))
                    .map_err(|e| AppError::Decode(format!("course record {} is malformed: {}", index, e)))
            })
            .collect()
    }
}
