//! Application settings and the static navigation profile of the storefront

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::traits::WaitPolicy;

const DEFAULT_SETTINGS_PATH: &str = "app-settings.json";

/// Runtime settings read from `app-settings.json`, with environment overrides
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default = "default_import_path")]
    pub import_path: PathBuf,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub timeouts: Timeouts,
}

fn default_import_path() -> PathBuf {
    PathBuf::from("import")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("output")
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            import_path: default_import_path(),
            output_path: default_output_path(),
            debug: false,
            timeouts: Timeouts::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from the file named by `APP_SETTINGS` (default `app-settings.json`),
    /// then apply `IMPORT_PATH` / `OUTPUT_PATH` overrides.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("APP_SETTINGS").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string());
        let settings = Self::load(Path::new(&path))?;

        Ok(settings.with_overrides(
            std::env::var("IMPORT_PATH").ok(),
            std::env::var("OUTPUT_PATH").ok(),
        ))
    }

    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Settings file {} not found - using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;

        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn with_overrides(mut self, import_path: Option<String>, output_path: Option<String>) -> Self {
        if let Some(p) = import_path.filter(|p| !p.trim().is_empty()) {
            self.import_path = PathBuf::from(p);
        }
        if let Some(p) = output_path.filter(|p| !p.trim().is_empty()) {
            self.output_path = PathBuf::from(p);
        }
        self
    }
}

/// Time bounds for page interaction, in milliseconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub selector_ms: u64,
    pub idle_window_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            selector_ms: 10_000,
            idle_window_ms: 500,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn selector(&self) -> Duration {
        Duration::from_millis(self.selector_ms)
    }

    /// Wait policy for pages that must be fully settled before reading
    pub fn network_idle(&self) -> WaitPolicy {
        WaitPolicy::NetworkIdle {
            window: Duration::from_millis(self.idle_window_ms),
        }
    }
}

/// Navigation profile for one storefront
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Display name for the website
    pub name: String,
    /// Landing page holding the age gate
    pub base_url: String,
    /// Search URL; the product name is appended to it
    pub search_base_url: String,
    pub user_agent: String,
    pub selectors: SiteSelectors,
}

/// CSS selectors used along the navigation sequence
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Age verification control dismissed once per session
    pub age_gate: String,
    /// First product in the search results
    pub result_item: String,
    pub pagination: PaginationSelector,
    /// Category name to the filter control narrowing the search results
    pub category_filters: BTreeMap<String, String>,
    /// Price cell of the first listing row
    pub first_price: String,
    /// Price cell of the last listing row
    pub last_price: String,
    /// Package amount indicator of the listing
    pub amount: String,
}

/// Page size control and the value that shows every row
#[derive(Debug, Clone)]
pub struct PaginationSelector {
    pub control: String,
    pub show_all_value: String,
}

impl SiteConfig {
    /// Search URL for a product name, encoded as a query component
    pub fn search_url(&self, name: &str) -> String {
        format!("{}{}", self.search_base_url, urlencoding::encode(name))
    }

    pub fn category_filter(&self, category: &str) -> Option<&str> {
        self.selectors.category_filters.get(category).map(String::as_str)
    }
}
