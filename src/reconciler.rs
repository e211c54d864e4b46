use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use crate::matcher::RecordMatcher;
use crate::models::{
    CategoryResultSet, ReconciliationReport, ReferenceCatalog, ReferenceRecord, ReportBuilder, ResultRecord,
};
use crate::runner::CategoryRunner;
use crate::traits::{BrowserLauncher, ReferenceSource, ReportExporter};

/// Lifecycle of one reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Importing,
    NoData,
    Scraping,
    Exporting,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub state: RunState,
    pub categories: usize,
    pub records: usize,
    pub matched: usize,
}

/// Imports reference data, reconciles every category against the storefront and
/// exports the report.
pub struct Reconciler {
    source: Arc<dyn ReferenceSource>,
    launcher: Arc<dyn BrowserLauncher>,
    exporter: Arc<dyn ReportExporter>,
    matcher: RecordMatcher,
    state: RunState,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn ReferenceSource>,
        launcher: Arc<dyn BrowserLauncher>,
        exporter: Arc<dyn ReportExporter>,
        matcher: RecordMatcher,
    ) -> Self {
        Self {
            source,
            launcher,
            exporter,
            matcher,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        info!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the whole pipeline. Scraping failures are absorbed per category, whose
    /// records are then reported unmatched; only an export failure ends in
    /// [`RunState::Failed`].
    pub async fn run(&mut self) -> RunSummary {
        info!("**App Started**");

        self.transition(RunState::Importing);
        let catalog = match self.source.import().await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Failed to import reference data: {:#}", e);
                ReferenceCatalog::new()
            }
        };

        let report = if catalog.values().all(Vec::is_empty) {
            self.transition(RunState::NoData);
            info!("No reference data, unable to scrape product information");
            ReconciliationReport::default()
        } else {
            self.transition(RunState::Scraping);
            self.scrape(catalog).await
        };

        self.transition(RunState::Exporting);
        let next = match self.exporter.export(&report) {
            Ok(()) => RunState::Done,
            Err(e) => {
                error!("Failed to export report: {}", e);
                RunState::Failed
            }
        };
        self.transition(next);

        let matched = report
            .categories()
            .flat_map(|set| set.records.iter())
            .filter(|r| r.observed.is_some())
            .count();
        info!("** Job Complete **");

        RunSummary {
            state: self.state,
            categories: report.category_count(),
            records: report.record_count(),
            matched,
        }
    }

    async fn scrape(&self, catalog: ReferenceCatalog) -> ReconciliationReport {
        let mut builder = ReportBuilder::new();

        let browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                error!("Failed to start browser: {}", e);
                for (category, records) in &catalog {
                    builder.insert(self.unmatched_set(category, records));
                }
                return builder.build();
            }
        };

        let mut handles = Vec::with_capacity(catalog.len());
        for (category, records) in catalog {
            let browser = Arc::clone(&browser);
            let runner = CategoryRunner::new(self.matcher.clone());
            let task_category = category.clone();
            let task_records = records.clone();

            let handle = tokio::spawn(async move {
                let session = browser
                    .new_session()
                    .await
                    .with_context(|| format!("Failed to open a session for {task_category}"))?;
                runner.run(&task_category, &task_records, session).await
            });
            handles.push((category, records, handle));
        }

        for (category, records, handle) in handles {
            match handle.await {
                Ok(Ok(set)) => builder.insert(set),
                Ok(Err(e)) => {
                    error!("An error occurred while searching for {}: {:#}", category, e);
                    builder.insert(self.unmatched_set(&category, &records));
                }
                Err(e) => {
                    error!("Search for {} aborted: {}", category, e);
                    builder.insert(self.unmatched_set(&category, &records));
                }
            }
        }

        browser.close().await;

        let report = builder.build();
        info!(
            "Completed scraping product information, got {} categories",
            report.category_count()
        );
        report
    }

    /// Rows for a category whose runner never produced results: every named
    /// record, without observed prices, pointing at the landing page.
    fn unmatched_set(&self, category: &str, records: &[ReferenceRecord]) -> CategoryResultSet {
        let landing = &self.matcher.site().base_url;
        CategoryResultSet {
            category: category.to_string(),
            records: records
                .iter()
                .filter(|r| !r.name.trim().is_empty())
                .map(|r| ResultRecord::unmatched(r, landing.clone()))
                .collect(),
        }
    }
}
