use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::db::repository::{self, COURSE_COLUMNS};
use crate::error::AppError;
use crate::models::{CatalogRecord, Course};

/// Course columns a child scope writes on commit. `first_synced_at` is left
/// out so the primary value survives a merge.
const MERGED_COLUMNS: [&str; 15] = [
    "subject",
    "catalog_number",
    "section",
    "description",
    "meeting_pattern",
    "start_time",
    "end_time",
    "component",
    "units",
    "combined_section",
    "designation",
    "facility_id",
    "instructor_first_name",
    "instructor_last_name",
    "last_synced_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub upserted: u64,
    pub removed: u64,
}

/// Isolated write buffer derived from a [`DurableStore`](crate::db::DurableStore).
///
/// Records are staged in `course_staging` under this scope's id and stay
/// invisible to course queries until [`ChildScope::commit`] merges them into
/// the primary scope in a single transaction.
#[derive(Debug)]
pub struct ChildScope {
    pool: SqlitePool,
    id: Uuid,
    next_seq: i64,
}

impl ChildScope {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            id: Uuid::new_v4(),
            next_seq: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of records staged so far.
    pub fn staged(&self) -> usize {
        self.next_seq as usize
    }

    pub async fn stage(&mut self, records: Vec<CatalogRecord>) -> Result<usize, AppError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut seq = self.next_seq;
        for record in &records {
            match record {
                CatalogRecord::Course(course) => stage_course(&mut tx, self.id, seq, course).await?,
            }
            seq += 1;
        }
        tx.commit().await?;

        self.next_seq = seq;
        debug!(scope = %self.id, staged = records.len(), total = seq, "staged catalog records");
        Ok(records.len())
    }

    /// Merges the staged records into the primary scope.
    ///
    /// Staged rows apply in staging order, so a later page wins over an
    /// earlier one for the same id. Courses missing from the staged set are
    /// removed; the primary scope afterwards mirrors this scope exactly.
    /// `synced_at` becomes the store's last successful sync in the same
    /// transaction. The scope is empty again once the commit succeeds.
    pub async fn commit(&mut self, synced_at: DateTime<Utc>) -> Result<CommitSummary, AppError> {
        let assignments = MERGED_COLUMNS
            .iter()
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        let upsert = format!(
            r#"
            INSERT INTO courses ({COURSE_COLUMNS}, first_synced_at, last_synced_at)
            SELECT {COURSE_COLUMNS}, ?1, ?1 FROM course_staging
            WHERE scope_id = ?2
            ORDER BY seq
            ON CONFLICT(id) DO UPDATE SET {assignments}
            "#
        );

        let mut tx = self.pool.begin().await?;

        let upserted = sqlx::query(&upsert)
            .bind(synced_at)
            .bind(self.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let removed = sqlx::query(
            "DELETE FROM courses WHERE id NOT IN (SELECT id FROM course_staging WHERE scope_id = ?)",
        )
        .bind(self.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM course_staging WHERE scope_id = ?")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;

        repository::record_sync_success(&mut *tx, synced_at).await?;

        tx.commit().await?;
        self.next_seq = 0;

        debug!(scope = %self.id, upserted, removed, "child scope committed");
        Ok(CommitSummary { upserted, removed })
    }

    pub async fn discard(self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM course_staging WHERE scope_id = ?")
            .bind(self.id)
            .execute(&self.pool)
            .await?;
        debug!(scope = %self.id, "child scope discarded");
        Ok(())
    }
}

async fn stage_course(
    tx: &mut Transaction<'_, Sqlite>,
    scope_id: Uuid,
    seq: i64,
    course: &Course,
) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO course_staging (scope_id, seq, {COURSE_COLUMNS}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    sqlx::query(&sql)
        .bind(scope_id)
        .bind(seq)
        .bind(course.id)
        .bind(&course.subject)
        .bind(&course.catalog_number)
        .bind(&course.section)
        .bind(&course.description)
        .bind(&course.meeting_pattern)
        .bind(&course.start_time)
        .bind(&course.end_time)
        .bind(&course.component)
        .bind(course.units)
        .bind(&course.combined_section)
        .bind(&course.designation)
        .bind(&course.facility_id)
        .bind(&course.instructor_first_name)
        .bind(&course.instructor_last_name)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
