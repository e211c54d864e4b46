//! Scripted collaborators shared by the pipeline tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{PaginationSelector, SiteConfig, SiteSelectors};
use crate::error::{BrowseError, ExportError};
use crate::models::{ReconciliationReport, ReferenceCatalog};
use crate::traits::{Browser, BrowserLauncher, ReferenceSource, ReportExporter, Session, WaitPolicy};

pub const PRODUCT_URL: &str = "https://shop.test/product/1";

pub fn site() -> SiteConfig {
    SiteConfig {
        name: "Test Shop".into(),
        base_url: "https://shop.test/".into(),
        search_base_url: "https://shop.test/search?q=".into(),
        user_agent: "test".into(),
        selectors: SiteSelectors {
            age_gate: ".age-gate".into(),
            result_item: ".results a".into(),
            pagination: PaginationSelector {
                control: ".pager select".into(),
                show_all_value: "all".into(),
            },
            category_filters: BTreeMap::from([("Flower".to_string(), "input[value='Flower']".to_string())]),
            first_price: ".first".into(),
            last_price: ".last".into(),
            amount: ".amount".into(),
        },
    }
}

/// Every session operation, tagged with the id of the session that performed it
#[derive(Clone, Default)]
pub struct SessionLog {
    entries: Arc<Mutex<Vec<(usize, String)>>>,
    navigations: Arc<Mutex<Vec<(String, WaitPolicy)>>>,
    next_id: Arc<AtomicUsize>,
}

impl SessionLog {
    fn register(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn push(&self, session: usize, op: String) {
        self.entries.lock().unwrap().push((session, op));
    }

    pub fn entries(&self) -> Vec<(usize, String)> {
        self.entries.lock().unwrap().clone()
    }

    /// Every navigation target with the wait policy it was loaded with
    pub fn navigations(&self) -> Vec<(String, WaitPolicy)> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, op)| op).collect()
    }
}

/// What the scripted storefront shows
#[derive(Clone, Default)]
pub struct ScriptedPage {
    pub first: String,
    pub last: String,
    pub amount: String,
    /// Selectors that never appear
    pub missing: Vec<String>,
    /// Navigations to URLs containing one of these fail
    pub fail_navigation_for: Vec<String>,
    /// Navigations to URLs containing one of these panic
    pub panic_for: Vec<String>,
    /// Artificial latency of every operation
    pub latency: Duration,
}

impl ScriptedPage {
    pub fn with_prices(first: &str, last: &str, amount: &str) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
            amount: amount.into(),
            ..Self::default()
        }
    }
}

pub struct ScriptedSession {
    id: usize,
    log: SessionLog,
    page: ScriptedPage,
    url: String,
    pending: bool,
    result_item: String,
}

impl ScriptedSession {
    pub fn new(log: SessionLog, page: ScriptedPage) -> Self {
        Self {
            id: log.register(),
            log,
            page,
            url: String::new(),
            pending: false,
            result_item: site().selectors.result_item,
        }
    }

    async fn step(&self, op: String) {
        self.log.push(self.id, op);
        if !self.page.latency.is_zero() {
            tokio::time::sleep(self.page.latency).await;
        }
    }

    fn is_missing(&self, selector: &str) -> bool {
        self.page.missing.iter().any(|m| m == selector)
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), BrowseError> {
        self.log.navigations.lock().unwrap().push((url.to_string(), wait));
        self.step(format!("navigate {url}")).await;
        if self.page.panic_for.iter().any(|p| url.contains(p.as_str())) {
            panic!("scripted panic navigating to {url}");
        }
        if self.page.fail_navigation_for.iter().any(|p| url.contains(p.as_str())) {
            return Err(BrowseError::navigation(url, "scripted failure"));
        }
        self.pending = false;
        self.url = url.to_string();
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowseError> {
        self.step(format!("click {selector}")).await;
        if self.is_missing(selector) {
            return Err(BrowseError::not_found(selector));
        }
        if selector == self.result_item {
            self.pending = true;
        }
        Ok(())
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), BrowseError> {
        self.step(format!("select {selector}={value}")).await;
        if self.is_missing(selector) {
            return Err(BrowseError::not_found(selector));
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowseError> {
        self.step(format!("wait {selector}")).await;
        if self.is_missing(selector) {
            return Err(BrowseError::timeout(selector, timeout));
        }
        Ok(())
    }

    async fn wait_for_navigation(&mut self, _wait: WaitPolicy) -> Result<(), BrowseError> {
        self.step("wait navigation".into()).await;
        if !std::mem::take(&mut self.pending) {
            return Err(BrowseError::timeout("navigation", Duration::from_secs(10)));
        }
        self.url = PRODUCT_URL.to_string();
        Ok(())
    }

    async fn read_text(&mut self, selector: &str) -> Result<String, BrowseError> {
        self.step(format!("read {selector}")).await;
        let s = site().selectors;
        let text = if self.is_missing(selector) {
            None
        } else if selector == s.first_price {
            Some(self.page.first.clone())
        } else if selector == s.last_price {
            Some(self.page.last.clone())
        } else if selector == s.amount {
            Some(self.page.amount.clone())
        } else {
            None
        };
        text.ok_or_else(|| BrowseError::not_found(selector))
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }

    async fn close(&mut self) {
        self.log.push(self.id, "close".into());
    }
}

pub struct ScriptedBrowser {
    pub log: SessionLog,
    pub page: ScriptedPage,
    pub fail_sessions: bool,
    pub closes: AtomicUsize,
}

impl ScriptedBrowser {
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            log: SessionLog::default(),
            page,
            fail_sessions: false,
            closes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn new_session(&self) -> Result<Box<dyn Session>, BrowseError> {
        if self.fail_sessions {
            return Err(BrowseError::Launch("scripted session failure".into()));
        }
        Ok(Box::new(ScriptedSession::new(self.log.clone(), self.page.clone())))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct ScriptedLauncher {
    pub browser: Arc<ScriptedBrowser>,
    pub launches: AtomicUsize,
    pub fail: bool,
}

impl ScriptedLauncher {
    pub fn new(browser: ScriptedBrowser) -> Self {
        Self {
            browser: Arc::new(browser),
            launches: AtomicUsize::new(0),
            fail: false,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowseError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BrowseError::Launch("scripted launch failure".into()));
        }
        Ok(self.browser.clone())
    }
}

pub struct StaticSource(pub ReferenceCatalog);

#[async_trait]
impl ReferenceSource for StaticSource {
    async fn import(&self) -> Result<ReferenceCatalog> {
        Ok(self.0.clone())
    }
}

/// Keeps every exported report; optionally fails the export
#[derive(Default)]
pub struct RecordingExporter {
    pub reports: Mutex<Vec<ReconciliationReport>>,
    pub fail: bool,
}

impl ReportExporter for RecordingExporter {
    fn export(&self, report: &ReconciliationReport) -> Result<(), ExportError> {
        self.reports.lock().unwrap().push(report.clone());
        if self.fail {
            return Err(ExportError::Io {
                path: "scripted".into(),
                source: std::io::Error::other("scripted export failure"),
            });
        }
        Ok(())
    }
}
