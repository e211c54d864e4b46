use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::matcher::RecordMatcher;
use crate::models::{CategoryResultSet, ReferenceRecord};
use crate::traits::Session;

/// Drives the matcher over every record of one category with a single session
pub struct CategoryRunner {
    matcher: RecordMatcher,
}

impl CategoryRunner {
    pub fn new(matcher: RecordMatcher) -> Self {
        Self { matcher }
    }

    /// Dismiss the age gate, match every record in order, then close the session.
    ///
    /// Fails only when the session cannot get past the landing page; record
    /// failures end up as rows without observed prices.
    pub async fn run(
        &self,
        category: &str,
        records: &[ReferenceRecord],
        mut session: Box<dyn Session>,
    ) -> Result<CategoryResultSet> {
        info!("Starting browser search flow for {}", category);

        let outcome = self.run_open(category, records, session.as_mut()).await;
        session.close().await;
        outcome
    }

    async fn run_open(
        &self,
        category: &str,
        records: &[ReferenceRecord],
        session: &mut dyn Session,
    ) -> Result<CategoryResultSet> {
        let site = self.matcher.site();
        session
            .navigate(&site.base_url, self.matcher.timeouts().network_idle())
            .await
            .with_context(|| format!("Failed to open {} for {}", site.base_url, category))?;
        session
            .click(&site.selectors.age_gate)
            .await
            .with_context(|| format!("Failed to pass the age gate for {category}"))?;

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            if record.name.trim().is_empty() {
                warn!("Skipping {} record without a product name", category);
                continue;
            }
            results.push(self.matcher.match_record(session, category, record).await);
        }

        let matched = results.iter().filter(|r| r.observed.is_some()).count();
        info!(
            "Finished {}: {}/{} records matched",
            category,
            matched,
            results.len()
        );

        Ok(CategoryResultSet {
            category: category.to_string(),
            records: results,
        })
    }
}
