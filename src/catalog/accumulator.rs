use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::{CatalogPage, PageClient};
use crate::error::AppError;

/// Receives pages in the order they were fetched.
#[async_trait]
pub trait PageSink: Send {
    async fn accept(&mut self, page_number: u32, page: CatalogPage) -> Result<(), AppError>;
}

/// Keeps every page in memory until the chain completes.
#[async_trait]
impl PageSink for Vec<CatalogPage> {
    async fn accept(&mut self, _page_number: u32, page: CatalogPage) -> Result<(), AppError> {
        self.push(page);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorState {
    Idle,
    Fetching { page: u32, url: Url },
    Complete { pages: u32 },
    Failed { page: u32, reason: String },
}

/// Walks the catalog's pagination links one page at a time.
///
/// The address of page `n + 1` is only known once page `n` has been decoded,
/// so fetches never overlap.
pub struct CatalogAccumulator {
    client: Arc<dyn PageClient>,
    max_pages: u32,
    state: AccumulatorState,
}

impl CatalogAccumulator {
    pub fn new(client: Arc<dyn PageClient>, max_pages: u32) -> Self {
        Self {
            client,
            max_pages,
            state: AccumulatorState::Idle,
        }
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    /// Runs the chain from `first_page` to the terminal page and returns the
    /// number of pages fetched.
    ///
    /// On error the accumulator ends in [`AccumulatorState::Failed`]; whatever
    /// the sink received for this chain must be discarded by the caller.
    pub async fn run<S>(
        &mut self,
        first_page: Url,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<u32, AppError>
    where
        S: PageSink + ?Sized,
    {
        let mut page = 1;
        let mut url = first_page;
        loop {
            self.state = AccumulatorState::Fetching {
                page,
                url: url.clone(),
            };

            match self.fetch(page, &url, sink, cancel).await {
                Ok(None) => {
                    self.state = AccumulatorState::Complete { pages: page };
                    return Ok(page);
                }
                Ok(Some(next)) if page >= self.max_pages => {
                    let error = AppError::Decode(format!(
                        "pagination exceeded {} pages (next link {})",
                        self.max_pages, next
                    ));
                    return Err(self.fail(page, error));
                }
                Ok(Some(next)) => {
                    page += 1;
                    url = next;
                }
                Err(e) => return Err(self.fail(page, e)),
            }
        }
    }

    fn fail(&mut self, page: u32, error: AppError) -> AppError {
        warn!(page, "catalog chain failed: {}", error);
        self.state = AccumulatorState::Failed {
            page,
            reason: error.to_string(),
        };
        error
    }

    async fn fetch<S>(
        &self,
        page_number: u32,
        url: &Url,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<Option<Url>, AppError>
    where
        S: PageSink + ?Sized,
    {
        if cancel.is_cancelled() {
            return Err(AppError::Aborted);
        }

        debug!(page = page_number, %url, "fetching catalog page");
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Aborted),
            page = self.client.fetch_page(url) => page?,
        };

        let next = page.next.clone();
        sink.accept(page_number, page).await?;
        Ok(next)
    }
}
