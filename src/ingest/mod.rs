//! CSV reference data import.
//!
//! Every `*.csv` file in the import directory is an inventory export. Exports may
//! start with a few preamble lines, so the header row is located by content: the
//! first row naming both `Product` and `Classification`. Rows are grouped by
//! classification and appended per category in file-name order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::StringRecord;
use tracing::{debug, error, info, warn};

use crate::error::IngestionError;
use crate::models::{ReferenceCatalog, ReferenceRecord};
use crate::traits::ReferenceSource;

const PRODUCT: &str = "Product";
const CLASSIFICATION: &str = "Classification";
const REGULAR_PRICE: &str = "Regular Price";

/// Imports reference records from a directory of CSV files
pub struct CsvImporter {
    import_path: PathBuf,
}

impl CsvImporter {
    pub fn new(import_path: impl Into<PathBuf>) -> Self {
        Self {
            import_path: import_path.into(),
        }
    }
}

#[async_trait]
impl ReferenceSource for CsvImporter {
    async fn import(&self) -> Result<ReferenceCatalog> {
        let path = self.import_path.clone();
        tokio::task::spawn_blocking(move || import_dir(&path))
            .await
            .context("CSV import task failed")?
    }
}

/// Import every CSV file of `dir`. A file that cannot be parsed is logged and skipped.
pub fn import_dir(dir: &Path) -> Result<ReferenceCatalog> {
    info!("Starting CSV import process");
    let mut catalog = ReferenceCatalog::new();

    if !dir.is_dir() {
        warn!("Import path {} does not exist, unable to import csv files", dir.display());
        return Ok(catalog);
    }

    let mut files = std::fs::read_dir(dir)
        .map_err(|source| IngestionError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect::<Vec<_>>();
    files.sort();
    info!("Found {} CSV files", files.len());

    for file in files {
        info!("Processing: {}", file.display());
        match parse_file(&file) {
            Ok(parsed) => {
                for (category, mut records) in parsed {
                    catalog.entry(category).or_default().append(&mut records);
                }
                info!("Finished parsing data for {}", file.display());
            }
            Err(e) => error!("Skipping file: {}", e),
        }
    }

    Ok(catalog)
}

/// Column positions found in the header row
struct Columns {
    product: usize,
    classification: usize,
    price: usize,
}

impl Columns {
    /// `None` if `row` is not the header row.
    fn locate(row: &StringRecord, path: &Path) -> Option<Result<Self, IngestionError>> {
        let find = |name: &str| row.iter().position(|cell| cell.trim() == name);

        let product = find(PRODUCT)?;
        let classification = find(CLASSIFICATION)?;
        let columns = find(REGULAR_PRICE)
            .map(|price| Self {
                product,
                classification,
                price,
            })
            .ok_or_else(|| IngestionError::MissingColumns {
                path: path.to_path_buf(),
                missing: REGULAR_PRICE.to_string(),
            });
        Some(columns)
    }
}

pub fn parse_file(path: &Path) -> Result<ReferenceCatalog, IngestionError> {
    let csv_error = |source| IngestionError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut columns: Option<Columns> = None;
    let mut catalog = ReferenceCatalog::new();

    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(csv_error)?;

        let Some(cols) = &columns else {
            if let Some(found) = Columns::locate(&row, path) {
                columns = Some(found?);
            }
            continue;
        };

        let cell = |idx: usize| row.get(idx).map(str::trim);
        let (Some(category), Some(name), Some(price)) =
            (cell(cols.classification), cell(cols.product), cell(cols.price))
        else {
            debug!("{}:{}: incomplete row skipped", path.display(), line + 1);
            continue;
        };
        if category.is_empty() {
            continue;
        }

        let Some(nominal_price) = parse_amount(price) else {
            warn!(
                "{}:{}: unreadable price {:?} for {}",
                path.display(),
                line + 1,
                price,
                name
            );
            continue;
        };

        catalog
            .entry(category.to_string())
            .or_default()
            .push(ReferenceRecord::new(name, nominal_price));
    }

    if columns.is_none() {
        return Err(IngestionError::MissingColumns {
            path: path.to_path_buf(),
            missing: format!("{PRODUCT}, {CLASSIFICATION}"),
        });
    }

    Ok(catalog)
}

fn parse_amount(text: &str) -> Option<f64> {
    text.trim()
        .trim_start_matches('$')
        .replace(',', "")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
