use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::db::StoreLocation;
use crate::error::AppError;

pub const DEFAULT_CATALOG_URL: &str = "https://moonlight.cs.sonoma.edu/api/v1/catalog/course/?term=2177";
pub const DEFAULT_STORE_NAME: &str = "Schedule";
const DATA_DIR_NAME: &str = "ssu-schedule";

/// How fetched pages reach the child scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Stage each page as soon as it is fetched.
    #[default]
    PerPage,
    /// Keep every page in memory and stage them once the chain is complete.
    Buffered,
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_page" | "per-page" => Ok(Self::PerPage),
            "buffered" => Ok(Self::Buffered),
            other => Err(format!("unknown commit mode {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub first_page: Url,
    pub commit_mode: CommitMode,
    pub max_pages: u32,
}

impl SyncSettings {
    pub fn new(first_page: Url) -> Self {
        Self {
            first_page,
            commit_mode: CommitMode::default(),
            max_pages: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreLocation,
    pub sync: SyncSettings,
    pub bind_addr: SocketAddr,
    pub http_timeout: Duration,
    pub auto_sync_interval_secs: Option<u64>,
    pub auto_sync_confirm: bool,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let catalog_url = lookup("CATALOG_URL").unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());
        let first_page = Url::parse(&catalog_url)
            .map_err(|e| AppError::Config(format!("CATALOG_URL is invalid: {}", e)))?;

        let data_dir = match lookup("DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .map(|dir| dir.join(DATA_DIR_NAME))
                .ok_or_else(|| {
                    AppError::Config("DATA_DIR is not set and no local data directory exists".to_string())
                })?,
        };
        let store_name = lookup("STORE_NAME").unwrap_or_else(|| DEFAULT_STORE_NAME.to_string());
        let mut store = StoreLocation::new(data_dir, &store_name);
        if let Some(seed_dir) = lookup("SEED_DIR") {
            store = store.with_seed_dir(seed_dir);
        }

        let mut sync = SyncSettings::new(first_page);
        if let Some(mode) = parse_var(&lookup, "SYNC_COMMIT_MODE")? {
            sync.commit_mode = mode;
        }
        if let Some(max_pages) = parse_var(&lookup, "MAX_PAGES")? {
            sync.max_pages = max_pages;
        }
        if sync.max_pages == 0 {
            return Err(AppError::Config("MAX_PAGES must be at least 1".to_string()));
        }

        let bind_addr = parse_var(&lookup, "BIND_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));
        let http_timeout = Duration::from_secs(parse_var(&lookup, "HTTP_TIMEOUT_SECS")?.unwrap_or(30));
        let auto_sync_interval_secs = parse_var(&lookup, "AUTO_SYNC_INTERVAL_SECS")?;
        if auto_sync_interval_secs == Some(0) {
            return Err(AppError::Config("AUTO_SYNC_INTERVAL_SECS must be positive".to_string()));
        }
        let auto_sync_confirm = parse_var(&lookup, "AUTO_SYNC_CONFIRM")?.unwrap_or(false);

        Ok(Self {
            store,
            sync,
            bind_addr,
            http_timeout,
            auto_sync_interval_secs,
            auto_sync_confirm,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{} is invalid: {}", name, e))),
        None => Ok(None),
    }
}
