use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::services::Preapproved;
use crate::state::AppState;

#[derive(Deserialize)]
struct SyncParams {
    #[serde(default)]
    confirm: bool,
}

#[derive(Serialize)]
struct AbortResponse {
    aborted: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(get_course))
        .route("/schedule", get(list_schedule))
        .route("/schedule/week", get(weekly_schedule))
        .route(
            "/schedule/{id}",
            get(enrollment_status).put(enroll).delete(unenroll),
        )
        .route("/sync", post(sync_now))
        .route("/sync/status", get(sync_status))
        .route("/sync/abort", post(abort_sync))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(state.store.primary()).await?;
    Ok(StatusCode::OK)
}

async fn list_courses(
    State(state): State<AppState>,
    Query(filter): Query<CourseFilter>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_courses(state.store.primary(), &filter).await?;
    Ok(Json(courses))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Course>, AppError> {
    let course = repository::find_course_by_id(state.store.primary(), id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn list_schedule(State(state): State<AppState>) -> Result<Json<Vec<ScheduleEntry>>, AppError> {
    let entries = state.enrollment.schedule().await?;
    Ok(Json(entries))
}

async fn weekly_schedule(
    State(state): State<AppState>,
) -> Result<Json<Vec<WeekdaySection>>, AppError> {
    let sections = state.enrollment.weekly_schedule().await?;
    Ok(Json(sections))
}

async fn enrollment_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<EnrollmentStatus>, AppError> {
    let enrolled = state.enrollment.is_enrolled(id).await?;
    Ok(Json(EnrollmentStatus {
        course_id: id,
        enrolled,
    }))
}

async fn enroll(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, AppError> {
    state.enrollment.enroll(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unenroll(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, AppError> {
    state.enrollment.unenroll(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_now(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Result<Json<SyncOutcome>, AppError> {
    // Detached so a dropped request cannot cut a sync off mid-commit.
    let orchestrator = state.sync.clone();
    let task = tokio::spawn(async move {
        let consent = Preapproved(params.confirm);
        orchestrator.sync(Utc::now(), &consent).await
    });

    let outcome = task.await.map_err(|e| {
        error!("sync task failed: {}", e);
        AppError::InternalServerError
    })??;
    Ok(Json(outcome))
}

async fn sync_status(State(state): State<AppState>) -> Result<Json<SyncStatus>, AppError> {
    let status = state.sync.status(Utc::now()).await?;
    Ok(Json(status))
}

async fn abort_sync(State(state): State<AppState>) -> Json<AbortResponse> {
    Json(AbortResponse {
        aborted: state.sync.abort(),
    })
}
