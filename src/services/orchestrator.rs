use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{CatalogAccumulator, CatalogPage, PageClient, PageSink, RecordBuilder};
use crate::config::{CommitMode, SyncSettings};
use crate::db::{ChildScope, DurableStore, repository};
use crate::error::AppError;
use crate::models::{SyncOutcome, SyncReport, SyncStatus};

/// Asked before a full catalog download starts.
#[async_trait]
pub trait DownloadConsent: Send + Sync {
    async fn confirm_download(&self) -> bool;
}

/// Consent decided ahead of time, e.g. by a request flag or a scheduler policy.
#[derive(Debug, Clone, Copy)]
pub struct Preapproved(pub bool);

#[async_trait]
impl DownloadConsent for Preapproved {
    async fn confirm_download(&self) -> bool {
        self.0
    }
}

/// Whether `a` and `b` fall on the same local calendar day.
pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.with_timezone(&Local).date_naive() == b.with_timezone(&Local).date_naive()
}

pub struct SyncOrchestrator {
    store: DurableStore,
    client: Arc<dyn PageClient>,
    builder: Arc<dyn RecordBuilder>,
    settings: SyncSettings,
    in_progress: AtomicBool,
    current_run: Mutex<Option<CancellationToken>>,
}

impl SyncOrchestrator {
    pub fn new(
        store: DurableStore,
        client: Arc<dyn PageClient>,
        builder: Arc<dyn RecordBuilder>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            client,
            builder,
            settings,
            in_progress: AtomicBool::new(false),
            current_run: Mutex::new(None),
        }
    }

    /// Brings the local catalog up to date with the remote one.
    ///
    /// At most once per local calendar day, and only after `consent` agrees.
    /// Course rows change only if every page of the chain was fetched.
    pub async fn sync(
        &self,
        now: DateTime<Utc>,
        consent: &dyn DownloadConsent,
    ) -> Result<SyncOutcome, AppError> {
        let Some(_guard) = RunGuard::acquire(self) else {
            info!("Catalog sync already in progress");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let state = repository::load_sync_state(self.store.primary()).await?;
        if let Some(last_success_at) = state.last_success_at.filter(|last| same_calendar_day(*last, now)) {
            debug!("Catalog is fresh (last sync {})", last_success_at);
            return Ok(SyncOutcome::Fresh { last_success_at });
        }

        if !consent.confirm_download().await {
            info!("Catalog download declined");
            return Ok(SyncOutcome::Declined);
        }

        let cancel = CancellationToken::new();
        *self.current_run.lock() = Some(cancel.clone());

        let report = self.run(Uuid::new_v4(), now, &cancel).await?;
        Ok(SyncOutcome::Completed(report))
    }

    /// Cancels the running sync, if any. Returns whether one was running.
    pub fn abort(&self) -> bool {
        match self.current_run.lock().as_ref() {
            Some(token) => {
                info!("Aborting catalog sync");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub async fn status(&self, now: DateTime<Utc>) -> Result<SyncStatus, AppError> {
        let state = repository::load_sync_state(self.store.primary()).await?;
        Ok(SyncStatus {
            in_progress: self.is_running(),
            last_success_at: state.last_success_at,
            fresh: state
                .last_success_at
                .is_some_and(|last| same_calendar_day(last, now)),
        })
    }

    #[tracing::instrument(name = "catalog_sync", skip_all, fields(run_id = %run_id))]
    async fn run(
        &self,
        run_id: Uuid,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, AppError> {
        info!("Updating catalog from {}", self.settings.first_page);

        let mut scope = self.store.derive_child_scope();
        let pages = match self.fetch_into(&mut scope, cancel).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("Error while updating catalog: {}", e);
                discard(scope).await;
                return Err(e);
            }
        };

        let records = scope.staged();
        let summary = match scope.commit(now).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Error while committing catalog: {}", e);
                discard(scope).await;
                return Err(e);
            }
        };

        info!(
            pages,
            records,
            upserted = summary.upserted,
            removed = summary.removed,
            "Catalog sync complete"
        );

        Ok(SyncReport {
            run_id,
            pages,
            records,
            upserted: summary.upserted,
            removed: summary.removed,
            synced_at: now,
        })
    }

    async fn fetch_into(
        &self,
        scope: &mut ChildScope,
        cancel: &CancellationToken,
    ) -> Result<u32, AppError> {
        let mut accumulator = CatalogAccumulator::new(self.client.clone(), self.settings.max_pages);
        let first_page = self.settings.first_page.clone();

        match self.settings.commit_mode {
            CommitMode::PerPage => {
                let mut sink = StagingSink {
                    builder: self.builder.as_ref(),
                    scope,
                };
                accumulator.run(first_page, &mut sink, cancel).await
            }
            CommitMode::Buffered => {
                let mut buffer: Vec<CatalogPage> = Vec::new();
                let pages = accumulator.run(first_page, &mut buffer, cancel).await?;
                for page in &buffer {
                    let records = self.builder.parse_page(page)?;
                    self.builder.commit(records, &mut *scope).await?;
                }
                Ok(pages)
            }
        }
    }
}

async fn discard(scope: ChildScope) {
    if let Err(e) = scope.discard().await {
        warn!("Unable to discard staged catalog records: {}", e);
    }
}

/// Stages each page in the child scope as soon as it arrives.
struct StagingSink<'a> {
    builder: &'a dyn RecordBuilder,
    scope: &'a mut ChildScope,
}

#[async_trait]
impl<'a> PageSink for StagingSink<'a> {
    async fn accept(&mut self, page_number: u32, page: CatalogPage) -> Result<(), AppError> {
        let records = self.builder.parse_page(&page)?;
        let staged = self.builder.commit(records, &mut *self.scope).await?;
        debug!(page = page_number, staged, "staged catalog page");
        Ok(())
    }
}

/// Holds the in-progress flag for one sync; releases it on every exit path.
struct RunGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
}

impl<'a> RunGuard<'a> {
    fn acquire(orchestrator: &'a SyncOrchestrator) -> Option<Self> {
        orchestrator
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { orchestrator })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.current_run.lock().take();
        self.orchestrator.in_progress.store(false, Ordering::Release);
    }
}
