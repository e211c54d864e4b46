use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{SiteConfig, Timeouts};
use crate::error::MatchFailure;
use crate::models::{ObservedPrices, ReferenceRecord, ResultRecord};
use crate::traits::Session;

/// Runs the storefront navigation sequence for one reference record
#[derive(Clone)]
pub struct RecordMatcher {
    site: Arc<SiteConfig>,
    timeouts: Timeouts,
}

impl RecordMatcher {
    pub fn new(site: Arc<SiteConfig>, timeouts: Timeouts) -> Self {
        Self { site, timeouts }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Reconcile one record. Never fails: any navigation or parse error yields a
    /// record without observed prices, pointing at the last page reached.
    pub async fn match_record(
        &self,
        session: &mut dyn Session,
        category: &str,
        record: &ReferenceRecord,
    ) -> ResultRecord {
        info!("Searching for {}", record.name);

        match self.observe(session, category, record).await {
            Ok(observed) => {
                info!(
                    "Matched {}: {:.2} - {:.2} ({})",
                    record.name, observed.lowest, observed.highest, observed.amount
                );
                ResultRecord::matched(record, observed, session.current_url())
            }
            Err(e) => {
                error!("Failed to match {}: {}", record.name, e);
                ResultRecord::unmatched(record, session.current_url())
            }
        }
    }

    async fn observe(
        &self,
        session: &mut dyn Session,
        category: &str,
        record: &ReferenceRecord,
    ) -> Result<ObservedPrices, MatchFailure> {
        let selectors = &self.site.selectors;
        let idle = self.timeouts.network_idle();

        // Always start over from the search page
        session.navigate(&self.site.search_url(&record.name), idle).await?;

        if let Some(filter) = self.site.category_filter(category) {
            session.wait_for_selector(filter, self.timeouts.selector()).await?;
            session.click(filter).await?;
        } else {
            warn!("Missing category filter selector for {}", category);
        }

        session
            .wait_for_selector(&selectors.result_item, self.timeouts.selector())
            .await?;
        session.click(&selectors.result_item).await?;
        session.wait_for_navigation(idle).await?;

        session
            .select_option(&selectors.pagination.control, &selectors.pagination.show_all_value)
            .await?;

        let first = session.read_text(&selectors.first_price).await?;
        let last = session.read_text(&selectors.last_price).await?;
        let amount = session.read_text(&selectors.amount).await?;

        Ok(ObservedPrices {
            lowest: parse_price(&first, "lowest price")?,
            highest: parse_price(&last, "highest price")?,
            amount,
        })
    }
}

/// Parse a displayed price such as `"$1,299.50"`.
pub fn parse_price(text: &str, field: &'static str) -> Result<f64, MatchFailure> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
        .unwrap_or(trimmed)
        .trim()
        .replace(',', "");

    digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MatchFailure::Parse {
            field,
            text: text.to_string(),
        })
}
