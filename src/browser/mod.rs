//! HTTP-backed navigation substrate.
//!
//! The browser-level resource is a session factory carrying the user agent and
//! timeouts; it builds no shared client. Each session owns its own `reqwest`
//! client with its own cookie store, so sessions share no cookies or page state,
//! and answers selector queries against the last fetched document with `scraper`.
//! Documents are parsed on demand inside synchronous helpers so that no parsed
//! `Html` is ever held across an await.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{SiteConfig, Timeouts};
use crate::error::BrowseError;
use crate::traits::{Browser, BrowserLauncher, Session, WaitPolicy};

const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Starts [`HttpBrowser`] instances for a storefront.
///
/// Launching checks that a client can be built with the configured user agent;
/// the client itself is discarded.
pub struct HttpLauncher {
    user_agent: String,
    timeouts: Timeouts,
}

impl HttpLauncher {
    pub fn new(site: &SiteConfig, timeouts: Timeouts) -> Self {
        Self {
            user_agent: site.user_agent.clone(),
            timeouts,
        }
    }
}

#[async_trait]
impl BrowserLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowseError> {
        info!("Creating browser instance");
        // Client construction errors surface here, not on the first session.
        build_client(&self.user_agent)?;

        Ok(Arc::new(HttpBrowser {
            user_agent: self.user_agent.clone(),
            timeouts: self.timeouts,
            closed: AtomicBool::new(false),
        }))
    }
}

fn build_client(user_agent: &str) -> Result<Client, BrowseError> {
    Client::builder()
        .user_agent(user_agent)
        .cookie_store(true)
        .build()
        .map_err(|e| BrowseError::Launch(e.to_string()))
}

/// Session factory; every session gets a fresh client and cookie store
pub struct HttpBrowser {
    user_agent: String,
    timeouts: Timeouts,
    closed: AtomicBool,
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_session(&self) -> Result<Box<dyn Session>, BrowseError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowseError::Closed);
        }

        debug!("Creating new browser page");
        Ok(Box::new(HttpSession {
            client: build_client(&self.user_agent)?,
            timeouts: self.timeouts,
            page: None,
            pending: None,
            closed: false,
        }))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Browser closed");
        }
    }
}

/// A fetched document and the URL it was fetched from
struct Page {
    url: Url,
    body: String,
}

pub struct HttpSession {
    client: Client,
    timeouts: Timeouts,
    page: Option<Page>,
    /// Navigation scheduled by a link click, committed by `wait_for_navigation`
    pending: Option<Url>,
    closed: bool,
}

impl HttpSession {
    fn ensure_open(&self) -> Result<(), BrowseError> {
        if self.closed {
            Err(BrowseError::Closed)
        } else {
            Ok(())
        }
    }

    fn body(&self) -> &str {
        self.page.as_ref().map_or("", |p| p.body.as_str())
    }

    async fn fetch(&self, url: &Url) -> Result<String, BrowseError> {
        let request = async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| BrowseError::navigation(url.as_str(), e))?;

            if !response.status().is_success() {
                return Err(BrowseError::navigation(
                    url.as_str(),
                    format!("HTTP {}", response.status()),
                ));
            }

            response
                .text()
                .await
                .map_err(|e| BrowseError::navigation(url.as_str(), e))
        };

        tokio::time::timeout(self.timeouts.navigation(), request)
            .await
            .map_err(|_| {
                BrowseError::navigation(
                    url.as_str(),
                    format!("page did not load within {:?}", self.timeouts.navigation()),
                )
            })?
    }

    /// Fetch `url`, honour the wait policy, then commit it as the current page.
    async fn load(&mut self, url: Url, wait: WaitPolicy) -> Result<(), BrowseError> {
        debug!("Loading page {}", url);
        let body = self.fetch(&url).await?;

        if let WaitPolicy::NetworkIdle { window } = wait {
            tokio::time::sleep(window).await;
        }

        self.page = Some(Page { url, body });
        Ok(())
    }

    fn current(&self) -> Result<Url, BrowseError> {
        self.page
            .as_ref()
            .map(|p| p.url.clone())
            .ok_or_else(|| BrowseError::navigation("", "no page loaded"))
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<(), BrowseError> {
        self.ensure_open()?;
        self.pending = None;

        let url = Url::parse(url).map_err(|e| BrowseError::navigation(url, e))?;
        self.load(url, wait).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowseError> {
        self.ensure_open()?;

        match click_target(self.body(), selector)? {
            ClickTarget::Link(href) => {
                let base = self.current()?;
                let target = base
                    .join(&href)
                    .map_err(|e| BrowseError::navigation(href.as_str(), e))?;
                debug!("Click on {} scheduled navigation to {}", selector, target);
                self.pending = Some(target);
                Ok(())
            }
            ClickTarget::Field { name, value } => {
                let url = with_query_pair(self.current()?, &name, &value);
                self.load(url, self.timeouts.network_idle()).await
            }
            ClickTarget::Inert => {
                debug!("Click on {} has no navigation effect", selector);
                Ok(())
            }
        }
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), BrowseError> {
        self.ensure_open()?;

        if let Some(name) = select_target(self.body(), selector, value)? {
            let url = with_query_pair(self.current()?, &name, value);
            self.load(url, self.timeouts.network_idle()).await?;
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowseError> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;

        loop {
            if has_match(self.body(), selector)? {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(BrowseError::timeout(selector, timeout));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;

            // Re-read the page; a failed refresh keeps the previous document.
            if let Some(url) = self.page.as_ref().map(|p| p.url.clone())
                && let Ok(body) = self.fetch(&url).await
            {
                self.page = Some(Page { url, body });
            }
        }
    }

    async fn wait_for_navigation(&mut self, wait: WaitPolicy) -> Result<(), BrowseError> {
        self.ensure_open()?;

        match self.pending.take() {
            Some(url) => self.load(url, wait).await,
            None => Err(BrowseError::timeout("navigation", self.timeouts.navigation())),
        }
    }

    async fn read_text(&mut self, selector: &str) -> Result<String, BrowseError> {
        self.ensure_open()?;
        read_first_text(self.body(), selector)
    }

    fn current_url(&self) -> String {
        self.page.as_ref().map(|p| p.url.to_string()).unwrap_or_default()
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.page = None;
            self.pending = None;
            debug!("Browser page closed");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ClickTarget {
    Link(String),
    Field { name: String, value: String },
    Inert,
}

fn parse_selector(selector: &str) -> Result<Selector, BrowseError> {
    Selector::parse(selector).map_err(|e| BrowseError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

fn has_match(body: &str, selector: &str) -> Result<bool, BrowseError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(body);
    let found = document.select(&selector).next().is_some();
    Ok(found)
}

fn read_first_text(body: &str, selector: &str) -> Result<String, BrowseError> {
    let parsed = parse_selector(selector)?;
    let document = Html::parse_document(body);
    document
        .select(&parsed)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .ok_or_else(|| BrowseError::not_found(selector))
}

fn click_target(body: &str, selector: &str) -> Result<ClickTarget, BrowseError> {
    let parsed = parse_selector(selector)?;
    let document = Html::parse_document(body);
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| BrowseError::not_found(selector))?;

    // The element itself or the closest enclosing link
    let link = std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|el| el.value().name() == "a" && el.value().attr("href").is_some())
        .and_then(|el| el.value().attr("href"));
    if let Some(href) = link {
        return Ok(ClickTarget::Link(href.to_string()));
    }

    let value = element.value();
    if value.name() == "input"
        && let Some(name) = value.attr("name")
    {
        return Ok(ClickTarget::Field {
            name: name.to_string(),
            value: value.attr("value").unwrap_or("on").to_string(),
        });
    }

    Ok(ClickTarget::Inert)
}

/// Check that `value` is one of the options and return the control's form name.
fn select_target(body: &str, selector: &str, value: &str) -> Result<Option<String>, BrowseError> {
    let parsed = parse_selector(selector)?;
    let option_selector = parse_selector("option")?;
    let document = Html::parse_document(body);
    let control = document
        .select(&parsed)
        .next()
        .ok_or_else(|| BrowseError::not_found(selector))?;

    let has_option = control.select(&option_selector).any(|option| {
        option
            .value()
            .attr("value")
            .map_or_else(|| option.text().collect::<String>().trim() == value, |v| v == value)
    });
    if !has_option {
        return Err(BrowseError::not_found(format!("{selector} option[value='{value}']")));
    }

    Ok(control.value().attr("name").map(str::to_string))
}

/// Set `name=value` in the query, replacing any previous value for `name`.
fn with_query_pair(mut url: Url, name: &str, value: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != name)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(name, value);
    url
}
