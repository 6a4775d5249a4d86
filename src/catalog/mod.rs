pub mod accumulator;
pub mod builder;
pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url, header};
use tracing::debug;

use crate::error::AppError;

pub use accumulator::{AccumulatorState, CatalogAccumulator, PageSink};
pub use builder::{JsonCourseBuilder, RecordBuilder};

/// One decoded page of the remote catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub records: Vec<serde_json::Value>,
    /// Address of the following page; `None` on the terminal page.
    pub next: Option<Url>,
}

impl CatalogPage {
    /// Decodes a page body fetched from `url`.
    ///
    /// An empty or null `next` marks the terminal page. A relative `next`
    /// resolves against `url`.
    pub fn decode(url: &Url, body: &str) -> Result<Self, AppError> {
        let response: dto::CatalogPageResponse = serde_json::from_str(body)
            .map_err(|e| AppError::Decode(format!("malformed catalog page {}: {}", url, e)))?;

        let next = match response.next.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(link) => Some(url.join(link).map_err(|e| {
                AppError::Decode(format!("invalid next link {:?} on {}: {}", link, url, e))
            })?),
        };

        Ok(Self {
            records: response.results,
            next,
        })
    }
}

#[async_trait]
pub trait PageClient: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<CatalogPage, AppError>;
}

pub struct HttpPageClient {
    client: Client,
}

impl HttpPageClient {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageClient for HttpPageClient {
    async fn fetch_page(&self, url: &Url) -> Result<CatalogPage, AppError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport(format!(
                "catalog API error {} for {}: {}",
                status, url, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Transport(format!("reading {} failed: {}", url, e)))?;

        let page = CatalogPage::decode(url, &body)?;
        debug!(%url, records = page.records.len(), has_next = page.next.is_some(), "fetched catalog page");
        Ok(page)
    }
}
