#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::Url;
use schedule_backend::catalog::{CatalogPage, JsonCourseBuilder, PageClient};
use schedule_backend::config::{CommitMode, SyncSettings};
use schedule_backend::db::{CATALOG_SCHEMA, DurableStore, StoreLocation};
use schedule_backend::error::AppError;
use schedule_backend::services::SyncOrchestrator;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Notify;

pub const FIRST_PAGE: &str = "https://catalog.test/api/v1/catalog/course/?term=2177";

pub fn page_url(n: u32) -> Url {
    if n == 1 {
        Url::parse(FIRST_PAGE).unwrap()
    } else {
        Url::parse(&format!("{}&page={}", FIRST_PAGE, n)).unwrap()
    }
}

pub fn course_json(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "subject": "CS",
        "catalog_number": format!("{}", 100 + id),
        "section": "001",
        "description": format!("Course {}", id),
        "meeting_pattern": "MW",
        "start_time": "09:00",
        "end_time": "09:50",
        "component": "LEC",
        "units": "3.00",
        "facility_id": "STEV1002",
        "instructor_first_name": "Ada",
        "instructor_last_name": "Lovelace"
    })
}

/// Pages `1..=ids.len()`, each linking to the next; the last has no link.
pub fn chain(ids: &[&[i64]]) -> Vec<(Url, CatalogPage)> {
    let total = ids.len() as u32;
    ids.iter()
        .enumerate()
        .map(|(i, page_ids)| {
            let n = i as u32 + 1;
            let next = (n < total).then(|| page_url(n + 1));
            let page = CatalogPage {
                records: page_ids.iter().map(|id| course_json(*id)).collect(),
                next,
            };
            (page_url(n), page)
        })
        .collect()
}

/// Serves canned pages and records every request in order.
#[derive(Default)]
pub struct FakePageClient {
    pages: Mutex<HashMap<Url, CatalogPage>>,
    failures: Mutex<HashMap<Url, String>>,
    requests: Mutex<Vec<Url>>,
    gate: Option<Gate>,
}

/// Holds every fetch until released, and signals when a fetch has started.
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakePageClient {
    pub fn new(pages: Vec<(Url, CatalogPage)>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn gated(pages: Vec<(Url, CatalogPage)>, gate: Gate) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(pages)
        }
    }

    pub fn fail_on(&self, url: Url, message: &str) {
        self.failures.lock().insert(url, message.to_string());
    }

    pub fn set_pages(&self, pages: Vec<(Url, CatalogPage)>) {
        *self.pages.lock() = pages.into_iter().collect();
        self.failures.lock().clear();
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PageClient for FakePageClient {
    async fn fetch_page(&self, url: &Url) -> Result<CatalogPage, AppError> {
        self.requests.lock().push(url.clone());

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if let Some(message) = self.failures.lock().get(url) {
            return Err(AppError::Transport(message.clone()));
        }
        self.pages
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Transport(format!("404 for {}", url)))
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: DurableStore,
    pub client: Arc<FakePageClient>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

pub async fn open_store(dir: &TempDir) -> DurableStore {
    DurableStore::open(&CATALOG_SCHEMA, &StoreLocation::new(dir.path(), "Schedule"))
        .await
        .expect("Failed to open store")
}

pub async fn harness_with(client: FakePageClient, mode: CommitMode) -> Harness {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open_store(&dir).await;
    let client = Arc::new(client);

    let mut settings = SyncSettings::new(page_url(1));
    settings.commit_mode = mode;
    settings.max_pages = 20;

    let orchestrator = Arc::new(SyncOrchestrator::new(
        store.clone(),
        client.clone(),
        Arc::new(JsonCourseBuilder),
        settings,
    ));

    Harness {
        dir,
        store,
        client,
        orchestrator,
    }
}

pub async fn harness(pages: Vec<(Url, CatalogPage)>) -> Harness {
    harness_with(FakePageClient::new(pages), CommitMode::PerPage).await
}

/// Local noon on the given day, as UTC.
pub fn local_noon(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("unambiguous local time")
        .with_timezone(&Utc)
}

pub async fn course_ids(store: &DurableStore) -> Vec<i64> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM courses ORDER BY id")
        .fetch_all(store.primary())
        .await
        .expect("Failed to list courses")
}
