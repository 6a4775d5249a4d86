use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use dotenvy::dotenv;
use schedule_backend::catalog::{HttpPageClient, JsonCourseBuilder};
use schedule_backend::config::AppConfig;
use schedule_backend::db::{CATALOG_SCHEMA, DurableStore, StoreLocation};
use schedule_backend::models::SyncOutcome;
use schedule_backend::services::{Preapproved, SyncOrchestrator};

fn is_forced() -> bool {
    std::env::args().any(|a| a == "--force")
}

fn output_dir() -> Option<PathBuf> {
    std::env::args()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
}

/// Builds the seed store that ships with the app: one full catalog sync into
/// a fresh file under the given directory.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let Some(out_dir) = output_dir() else {
        eprintln!("usage: build_seed <output-dir> [--force]");
        std::process::exit(2);
    };

    let config = AppConfig::new_from_env()?;
    let store_name = config
        .store
        .file_name
        .trim_end_matches(".sqlite")
        .to_string();
    let location = StoreLocation::new(&out_dir, &store_name);
    let path = location.store_path();

    if path.exists() {
        if !is_forced() {
            eprintln!("{} already exists; pass --force to rebuild it", path.display());
            std::process::exit(1);
        }
        std::fs::remove_file(&path)?;
        println!("Removed existing seed {}", path.display());
    }

    let store = DurableStore::open(&CATALOG_SCHEMA, &location).await?;
    let client = Arc::new(HttpPageClient::new(config.http_timeout)?);
    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        client,
        Arc::new(JsonCourseBuilder),
        config.sync.clone(),
    );

    println!("Fetching catalog from {}", config.sync.first_page);
    let outcome = orchestrator.sync(Utc::now(), &Preapproved(true)).await?;
    store.close().await;

    match outcome {
        SyncOutcome::Completed(report) => {
            println!(
                "Seed written to {}: {} courses from {} pages",
                path.display(),
                report.upserted,
                report.pages
            );
        }
        other => {
            eprintln!("No catalog downloaded: {:?}", other);
            std::process::exit(1);
        }
    }

    Ok(())
}
