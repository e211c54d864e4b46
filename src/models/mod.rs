//! Data models for reference products, reconciled results and the final report

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Catalog entry imported from a reference source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub name: String,
    pub nominal_price: f64,
    pub nominal_amount: String,
}

impl ReferenceRecord {
    /// Build a record, deriving the nominal amount from the trailing token of the name.
    pub fn new(name: impl Into<String>, nominal_price: f64) -> Self {
        let name = name.into();
        let nominal_amount = trailing_amount(&name);
        Self {
            name,
            nominal_price,
            nominal_amount,
        }
    }
}

/// Text after the last `-` of a display name, e.g. `"Pink Kush - 3.5g"` gives `"3.5g"`.
pub fn trailing_amount(name: &str) -> String {
    name.rfind('-')
        .map_or(name, |idx| &name[idx + 1..])
        .trim()
        .to_string()
}

/// Price bounds read from a matched listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedPrices {
    pub lowest: f64,
    pub highest: f64,
    pub amount: String,
}

/// A reference record reconciled against the storefront.
///
/// The observed fields live in one `Option` so they are either all present or all absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub nominal_amount: String,
    pub nominal_price: f64,
    pub observed: Option<ObservedPrices>,
    pub source_url: String,
}

impl ResultRecord {
    pub fn matched(reference: &ReferenceRecord, observed: ObservedPrices, source_url: String) -> Self {
        Self {
            name: reference.name.clone(),
            nominal_amount: reference.nominal_amount.clone(),
            nominal_price: reference.nominal_price,
            observed: Some(observed),
            source_url,
        }
    }

    pub fn unmatched(reference: &ReferenceRecord, source_url: String) -> Self {
        Self {
            name: reference.name.clone(),
            nominal_amount: reference.nominal_amount.clone(),
            nominal_price: reference.nominal_price,
            observed: None,
            source_url,
        }
    }

    pub fn lowest_observed_price(&self) -> Option<f64> {
        self.observed.as_ref().map(|o| o.lowest)
    }

    pub fn highest_observed_price(&self) -> Option<f64> {
        self.observed.as_ref().map(|o| o.highest)
    }

    pub fn observed_amount(&self) -> Option<&str> {
        self.observed.as_ref().map(|o| o.amount.as_str())
    }
}

/// Results for one category, in the order of the category's reference records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryResultSet {
    pub category: String,
    pub records: Vec<ResultRecord>,
}

/// Reference data keyed by category
pub type ReferenceCatalog = BTreeMap<String, Vec<ReferenceRecord>>;

/// Final per-category report. Built through [`ReportBuilder`], read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    sets: BTreeMap<String, CategoryResultSet>,
}

impl ReconciliationReport {
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn category_count(&self) -> usize {
        self.sets.len()
    }

    pub fn record_count(&self) -> usize {
        self.sets.values().map(|s| s.records.len()).sum()
    }

    #[allow(dead_code)]
    pub fn get(&self, category: &str) -> Option<&CategoryResultSet> {
        self.sets.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &CategoryResultSet> {
        self.sets.values()
    }
}

#[derive(Debug, Default)]
pub struct ReportBuilder {
    sets: BTreeMap<String, CategoryResultSet>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins when a category is inserted twice.
    pub fn insert(&mut self, set: CategoryResultSet) {
        self.sets.insert(set.category.clone(), set);
    }

    pub fn build(self) -> ReconciliationReport {
        ReconciliationReport { sets: self.sets }
    }
}
