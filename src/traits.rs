//! Traits and interfaces for the collaborators of the reconciliation pipeline

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::{BrowseError, ExportError};
use crate::models::{ReconciliationReport, ReferenceCatalog};

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// The document has been received
    #[allow(dead_code)]
    DomContentLoaded,
    /// No network activity for the given stabilisation window
    NetworkIdle { window: Duration },
}

/// One isolated browsing context.
///
/// Every method that touches the page is an await point; callers must not hold
/// a session across categories.
#[async_trait]
pub trait Session: Send {
    /// Navigate to `url` and wait until the page satisfies `wait`
    ///
    /// # Errors
    /// * `BrowseError::Navigation` - network failure or the page did not settle in time
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), BrowseError>;

    /// Click the first element matching `selector`
    ///
    /// # Errors
    /// * `BrowseError::ElementNotFound` - nothing matches
    async fn click(&mut self, selector: &str) -> Result<(), BrowseError>;

    /// Choose `value` in the `<select>` matching `selector`
    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), BrowseError>;

    /// Wait until `selector` matches an element
    ///
    /// # Errors
    /// * `BrowseError::Timeout` - nothing matched within `timeout`
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowseError>;

    /// Wait for a navigation triggered by a previous action to settle
    async fn wait_for_navigation(&mut self, wait: WaitPolicy) -> Result<(), BrowseError>;

    /// Trimmed text content of the first element matching `selector`
    async fn read_text(&mut self, selector: &str) -> Result<String, BrowseError>;

    /// URL of the last committed navigation, empty before the first one
    fn current_url(&self) -> String;

    /// Release the context. Safe to call more than once.
    async fn close(&mut self);
}

/// Browser-level resource shared by every category runner as a session factory
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn Session>, BrowseError>;

    /// Release the browser. Safe to call more than once.
    async fn close(&self);
}

/// Starts the browser-level resource on demand
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowseError>;
}

/// Source of reference data
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Import every reference record, grouped by category
    ///
    /// # Returns
    /// * `Result<ReferenceCatalog>` - categories with their records, possibly empty
    async fn import(&self) -> Result<ReferenceCatalog>;
}

/// Persists a finished report
pub trait ReportExporter: Send + Sync {
    fn export(&self, report: &ReconciliationReport) -> Result<(), ExportError>;
}
