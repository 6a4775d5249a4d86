use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};

use crate::models::{Course, CourseFilter, EnrollmentRow, SyncState};

pub(crate) const COURSE_COLUMNS: &str = "id, subject, catalog_number, section, description, \
    meeting_pattern, start_time, end_time, component, units, combined_section, designation, \
    facility_id, instructor_first_name, instructor_last_name";

const COURSE_ORDER: &str = " ORDER BY subject, catalog_number, section, id";

pub async fn fetch_courses(db: &SqlitePool, filter: &CourseFilter) -> Result<Vec<Course>, sqlx::Error> {
    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {COURSE_COLUMNS} FROM courses WHERE 1 = 1"));

    if let Some(subject) = filter.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(" AND UPPER(subject) = UPPER(")
            .push_bind(subject.to_string())
            .push(")");
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        query
            .push(" AND (description LIKE ")
            .push_bind(pattern.clone())
            .push(" OR catalog_number LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    query.push(COURSE_ORDER);
    query.build_query_as::<Course>().fetch_all(db).await
}

pub async fn find_course_by_id(db: &SqlitePool, id: i64) -> Result<Option<Course>, sqlx::Error> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?");
    sqlx::query_as::<_, Course>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn count_courses(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
        .fetch_one(db)
        .await
}

pub async fn is_enrolled(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM schedule_entries WHERE id = ?")
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(count > 0)
}

/// Returns `false` when the entry already existed.
pub async fn insert_enrollment(
    db: &SqlitePool,
    id: i64,
    added_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO schedule_entries (id, added_at) VALUES (?, ?) ON CONFLICT(id) DO NOTHING",
    )
    .bind(id)
    .bind(added_at)
    .execute(db)
    .await?
    .rows_affected();

    Ok(inserted > 0)
}

pub async fn delete_enrollment(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM schedule_entries WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(deleted > 0)
}

pub async fn fetch_enrollments(db: &SqlitePool) -> Result<Vec<EnrollmentRow>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentRow>(
        "SELECT id, added_at FROM schedule_entries ORDER BY added_at, id",
    )
    .fetch_all(db)
    .await
}

pub async fn fetch_enrolled_courses(db: &SqlitePool) -> Result<Vec<Course>, sqlx::Error> {
    let sql = format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id IN (SELECT id FROM schedule_entries){COURSE_ORDER}"
    );
    sqlx::query_as::<_, Course>(&sql).fetch_all(db).await
}

pub async fn load_sync_state(db: &SqlitePool) -> Result<SyncState, sqlx::Error> {
    let last_success_at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT last_success_at FROM sync_state WHERE singleton = 1",
    )
    .fetch_optional(db)
    .await?
    .flatten();

    Ok(SyncState { last_success_at })
}

pub async fn record_sync_success<'e, E>(db: E, at: DateTime<Utc>) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO sync_state (singleton, last_success_at) VALUES (1, ?)
        ON CONFLICT(singleton) DO UPDATE SET last_success_at = excluded.last_success_at
        "#,
    )
    .bind(at)
    .execute(db)
    .await?;

    Ok(())
}
