//! Reconciles a catalog of reference products against live storefront listings
//! and reports the observed price range of every product, grouped by category.

use std::sync::Arc;

use anyhow::Result;
use tracing::{Level, error, info};

mod browser;
mod config;
mod error;
mod export;
mod ingest;
mod matcher;
mod models;
mod reconciler;
mod runner;
mod scrapers;
#[cfg(test)]
mod testing;
mod traits;

use browser::HttpLauncher;
use config::AppSettings;
use export::XlsxExporter;
use ingest::CsvImporter;
use matcher::RecordMatcher;
use reconciler::{Reconciler, RunState};
use scrapers::hibuddy;

// Category runners interleave on one thread, yielding only at page I/O.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = AppSettings::from_env()?;

    let level = if settings.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let site = Arc::new(hibuddy::config());
    info!(
        "Starting price reconciliation against {} (import: {}, output: {})",
        site.name,
        settings.import_path.display(),
        settings.output_path.display()
    );

    let mut reconciler = Reconciler::new(
        Arc::new(CsvImporter::new(settings.import_path.clone())),
        Arc::new(HttpLauncher::new(&site, settings.timeouts)),
        Arc::new(XlsxExporter::new(settings.output_path.clone())),
        RecordMatcher::new(site, settings.timeouts),
    );

    let summary = reconciler.run().await;
    info!(
        "Reconciled {} categories: {}/{} records matched",
        summary.categories, summary.matched, summary.records
    );

    if summary.state == RunState::Failed {
        error!("Report could not be exported");
    }
    info!("Run finished in state {:?}", reconciler.state());

    Ok(())
}
