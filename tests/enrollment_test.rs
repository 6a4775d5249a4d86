mod common;

use chrono::Weekday;
use schedule_backend::db::DurableStore;
use schedule_backend::models::{CatalogRecord, Course};
use schedule_backend::services::EnrollmentStore;
use tempfile::TempDir;

use common::{local_noon, open_store};

fn course(id: i64, pattern: Option<&str>) -> CatalogRecord {
    let mut course = Course::with_id(id);
    course.subject = Some("CS".to_string());
    course.meeting_pattern = pattern.map(str::to_string);
    CatalogRecord::Course(course)
}

async fn seeded(dir: &TempDir, records: Vec<CatalogRecord>) -> (DurableStore, EnrollmentStore) {
    let store = open_store(dir).await;
    let mut scope = store.derive_child_scope();
    scope.stage(records).await.unwrap();
    scope.commit(local_noon(2026, 2, 10)).await.unwrap();
    let enrollment = EnrollmentStore::new(store.primary().clone());
    (store, enrollment)
}

#[test]
fn test_meeting_days_decoding() {
    let mut c = Course::with_id(1);
    assert!(c.meeting_days().is_empty());

    c.meeting_pattern = Some("TR".to_string());
    assert_eq!(c.meeting_days(), vec![Weekday::Tue, Weekday::Thu]);

    c.meeting_pattern = Some("fwm".to_string());
    assert_eq!(c.meeting_days(), vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);

    c.meeting_pattern = Some("MM SU TBA".to_string());
    assert_eq!(
        c.meeting_days(),
        vec![Weekday::Mon, Weekday::Tue, Weekday::Sat, Weekday::Sun]
    );
}

#[tokio::test]
async fn test_enroll_and_unenroll() {
    let dir = TempDir::new().unwrap();
    let (_store, enrollment) = seeded(&dir, vec![course(1, Some("MW"))]).await;

    assert!(!enrollment.is_enrolled(1).await.unwrap());

    enrollment.enroll(1).await.unwrap();
    assert!(enrollment.is_enrolled(1).await.unwrap());

    assert!(enrollment.unenroll(1).await.unwrap());
    assert!(!enrollment.is_enrolled(1).await.unwrap());
}

#[tokio::test]
async fn test_enroll_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (store, enrollment) = seeded(&dir, vec![course(1, Some("MW"))]).await;

    enrollment.enroll(1).await.unwrap();
    let first = enrollment.schedule().await.unwrap();
    enrollment.enroll(1).await.unwrap();
    let second = enrollment.schedule().await.unwrap();

    assert_eq!(second.len(), 1);
    assert_eq!(first[0].added_at, second[0].added_at);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schedule_entries")
        .fetch_one(store.primary())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_unenroll_missing_entry() {
    let dir = TempDir::new().unwrap();
    let (_store, enrollment) = seeded(&dir, Vec::new()).await;

    assert!(!enrollment.unenroll(99).await.unwrap());
}

#[tokio::test]
async fn test_enrollment_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let (store, enrollment) = seeded(&dir, vec![course(1, Some("MW"))]).await;
    enrollment.enroll(1).await.unwrap();
    store.close().await;

    let reopened = open_store(&dir).await;
    let enrollment = EnrollmentStore::new(reopened.primary().clone());
    assert!(enrollment.is_enrolled(1).await.unwrap());
}

#[tokio::test]
async fn test_schedule_keeps_entries_without_course() {
    let dir = TempDir::new().unwrap();
    let (_store, enrollment) = seeded(&dir, vec![course(1, Some("MW"))]).await;

    enrollment.enroll(1).await.unwrap();
    enrollment.enroll(404).await.unwrap();

    let schedule = enrollment.schedule().await.unwrap();

    assert_eq!(schedule.len(), 2);
    let known = schedule.iter().find(|e| e.course_id == 1).unwrap();
    assert_eq!(known.course.as_ref().map(|c| c.id), Some(1));
    let dangling = schedule.iter().find(|e| e.course_id == 404).unwrap();
    assert!(dangling.course.is_none());
}

#[tokio::test]
async fn test_weekly_schedule_groups_by_day() {
    let dir = TempDir::new().unwrap();
    let (_store, enrollment) = seeded(
        &dir,
        vec![
            course(1, Some("MW")),
            course(2, Some("TR")),
            course(3, Some("MWF")),
            course(4, None),
            course(5, Some("S")),
        ],
    )
    .await;

    for id in [1, 2, 3, 4] {
        enrollment.enroll(id).await.unwrap();
    }

    let week = enrollment.weekly_schedule().await.unwrap();

    let days: Vec<&str> = week.iter().map(|s| s.day.as_str()).collect();
    assert_eq!(days, vec!["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]);

    let ids = |day: &str| -> Vec<i64> {
        let section = week.iter().find(|s| s.day == day).unwrap();
        let mut ids: Vec<i64> = section.courses.iter().map(|c| c.id).collect();
        ids.sort();
        ids
    };
    assert_eq!(ids("Monday"), vec![1, 3]);
    assert_eq!(ids("Tuesday"), vec![2]);
    assert_eq!(ids("Wednesday"), vec![1, 3]);
    assert_eq!(ids("Thursday"), vec![2]);
    assert_eq!(ids("Friday"), vec![3]);
}

#[tokio::test]
async fn test_weekly_schedule_empty() {
    let dir = TempDir::new().unwrap();
    let (_store, enrollment) = seeded(&dir, vec![course(1, Some("MW"))]).await;

    assert!(enrollment.weekly_schedule().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_enroll_failure_is_returned() {
    let dir = TempDir::new().unwrap();
    let (store, enrollment) = seeded(&dir, vec![course(1, Some("MW"))]).await;

    sqlx::query("DROP TABLE schedule_entries")
        .execute(store.primary())
        .await
        .unwrap();

    assert!(enrollment.enroll(1).await.is_err());
    assert!(enrollment.unenroll(1).await.is_err());
    assert!(enrollment.is_enrolled(1).await.is_err());
}
