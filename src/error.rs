//! Error kinds raised by the pipeline and its collaborators

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of the navigation substrate
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("invalid selector {selector}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("failed to start browser: {0}")]
    Launch(String),

    #[error("browsing context is closed")]
    Closed,
}

impl BrowseError {
    pub fn navigation(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            timeout,
        }
    }
}

/// Why a single record could not be reconciled
#[derive(Debug, Error)]
pub enum MatchFailure {
    #[error(transparent)]
    Browse(#[from] BrowseError),

    #[error("could not parse {field} from {text:?}")]
    Parse { field: &'static str, text: String },
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("{path}: missing required columns: {missing}")]
    MissingColumns { path: PathBuf, missing: String },

    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to prepare output directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
