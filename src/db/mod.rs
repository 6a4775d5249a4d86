pub mod repository;
pub mod scope;

use std::path::{Path, PathBuf};

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::fs;
use tracing::{error, info, warn};

use crate::error::AppError;

pub use scope::{ChildScope, CommitSummary};

/// Schema of the catalog store.
pub static CATALOG_SCHEMA: Migrator = sqlx::migrate!("./migrations");

// Primary SQLite result codes.
const SQLITE_CORRUPT: i32 = 11;
const SQLITE_NOTADB: i32 = 26;
/// PERM, BUSY, LOCKED, NOMEM, READONLY, IOERR, FULL, CANTOPEN.
const SQLITE_TRANSIENT: [i32; 8] = [3, 5, 6, 7, 8, 10, 13, 14];

const CACHEDIR_TAG: &str = "CACHEDIR.TAG";
const CACHEDIR_TAG_CONTENTS: &str = "Signature: 8a477f597d28d172789f06886806bc55\n\
# This directory holds re-fetchable catalog data and is excluded from backups.\n";

/// Where a store file lives and where its optional seed comes from.
#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub data_dir: PathBuf,
    pub seed_dir: Option<PathBuf>,
    pub file_name: String,
}

impl StoreLocation {
    pub fn new(data_dir: impl Into<PathBuf>, store_name: &str) -> Self {
        Self {
            data_dir: data_dir.into(),
            seed_dir: None,
            file_name: format!("{store_name}.sqlite"),
        }
    }

    pub fn with_seed_dir(mut self, seed_dir: impl Into<PathBuf>) -> Self {
        self.seed_dir = Some(seed_dir.into());
        self
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }

    pub fn seed_path(&self) -> Option<PathBuf> {
        self.seed_dir.as_ref().map(|dir| dir.join(&self.file_name))
    }
}

/// A SQLite-backed store. The pool is the primary scope; background writers
/// derive a [`ChildScope`] and commit it into the primary scope.
#[derive(Debug, Clone)]
pub struct DurableStore {
    pool: SqlitePool,
    path: PathBuf,
    recovered_from: Option<String>,
}

impl DurableStore {
    /// Opens (or bootstraps) the store at `location` against `schema`.
    ///
    /// A missing store file is seeded from the seed directory when one ships
    /// there. An existing file that is not a readable database, or whose
    /// schema cannot be migrated to `schema`, is deleted and recreated empty;
    /// the reason is kept in [`DurableStore::recovered_from`]. Locking, I/O
    /// and permission failures are returned and leave the file alone.
    pub async fn open(schema: &'static Migrator, location: &StoreLocation) -> Result<Self, AppError> {
        fs::create_dir_all(&location.data_dir).await?;
        let path = location.store_path();

        if let Some(seed) = location.seed_path() {
            copy_seed_if_missing(&seed, &path).await;
        }

        let (pool, recovered_from) = match connect_and_migrate(&path, schema).await {
            Ok(pool) => (pool, None),
            Err(e) if !is_unusable_store(&e) => {
                error!("Unable to open store {}: {}", path.display(), e);
                return Err(e);
            }
            Err(e) => {
                warn!("Received error while opening store {}: {}", path.display(), e);
                warn!("Deleting existing store and retrying");
                remove_store_files(&path).await?;
                let pool = connect_and_migrate(&path, schema).await?;
                (pool, Some(e.to_string()))
            }
        };

        if let Err(e) = exclude_from_backup(&location.data_dir).await {
            warn!("Unable to exclude {} from backups: {}", location.data_dir.display(), e);
        }

        sqlx::query("DELETE FROM course_staging").execute(&pool).await?;

        info!("Opened store {}", path.display());
        Ok(Self {
            pool,
            path,
            recovered_from,
        })
    }

    /// The long-lived primary read/write scope.
    pub fn primary(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn derive_child_scope(&self) -> ChildScope {
        ChildScope::new(self.pool.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set when the existing file was discarded because it could not be opened.
    pub fn recovered_from(&self) -> Option<&str> {
        self.recovered_from.as_deref()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn connect_and_migrate(path: &Path, schema: &'static Migrator) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if let Err(e) = schema.run(&pool).await {
        pool.close().await;
        return Err(e.into());
    }

    Ok(pool)
}

/// Whether `error` means the file itself is unusable, as opposed to a
/// condition that may clear on its own.
fn is_unusable_store(error: &AppError) -> bool {
    match error {
        AppError::Database(e) => {
            sqlite_code(e).is_some_and(|code| code == SQLITE_NOTADB || code == SQLITE_CORRUPT)
        }
        AppError::Migration(e) => {
            match std::error::Error::source(e).and_then(|source| source.downcast_ref::<sqlx::Error>()) {
                Some(inner) => sqlite_code(inner).is_some_and(|code| !SQLITE_TRANSIENT.contains(&code)),
                // Version mismatches and dirty migrations.
                None => true,
            }
        }
        _ => false,
    }
}

fn sqlite_code(error: &sqlx::Error) -> Option<i32> {
    let sqlx::Error::Database(e) = error else {
        return None;
    };
    // Extended codes carry the primary code in the low byte.
    e.code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| code & 0xff)
}

async fn copy_seed_if_missing(seed: &Path, path: &Path) {
    if fs::try_exists(path).await.unwrap_or(false) {
        return;
    }
    if !fs::try_exists(seed).await.unwrap_or(false) {
        return;
    }

    match fs::copy(seed, path).await {
        Ok(_) => info!("Copied seed store {} to {}", seed.display(), path.display()),
        Err(e) => {
            error!("Unable to copy seed store {} to {}: {}", seed.display(), path.display(), e);
            error!("Starting with an empty database");
            let _ = fs::remove_file(path).await;
        }
    }
}

async fn remove_store_files(path: &Path) -> Result<(), AppError> {
    for suffix in ["", "-journal", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        match fs::remove_file(&file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn exclude_from_backup(dir: &Path) -> std::io::Result<()> {
    let tag = dir.join(CACHEDIR_TAG);
    if fs::try_exists(&tag).await? {
        return Ok(());
    }
    fs::write(tag, CACHEDIR_TAG_CONTENTS).await
}
