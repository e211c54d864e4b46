//! # Excel Report Export
//!
//! Writes the reconciliation report as an `.xlsx` workbook so the price comparison
//! can be reviewed in any spreadsheet application.
//!
//! ## Workbook Layout
//!
//! - **One sheet per category**: named after the category (sanitised for Excel)
//! - **Reference columns** (green): `ProductName`, `OriginalPrice`, `OriginalAmount`
//! - **Observed columns** (blue): `UrlAmount`, `Lowest`, `Highest`, `ProductUrl`
//! - **Hyperlinks**: `ProductUrl` cells open the page the prices were read from
//! - **Blank cells**: records that could not be matched leave the observed cells empty
//!
//! ## File Naming
//!
//! Reports are saved as `ScrapedProducts-YYYY-MM-DD_HH-MM-SS.xlsx` in the configured
//! output directory, which is created when missing. An empty report still produces
//! a workbook with a single header-only `Report` sheet.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use rust_xlsxwriter::{Color, Format, Url, Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::error::ExportError;
use crate::models::{ReconciliationReport, ResultRecord};
use crate::traits::ReportExporter;

const HEADERS: [&str; 7] = [
    "ProductName",
    "OriginalPrice",
    "OriginalAmount",
    "UrlAmount",
    "Lowest",
    "Highest",
    "ProductUrl",
];

const GREEN: u32 = 0x006F_FF94;
const BLUE: u32 = 0x006F_F8FF;

/// Excel rejects sheet names longer than this
const MAX_SHEET_NAME: usize = 31;

/// Report exporter producing timestamped `.xlsx` workbooks.
///
/// ## Fields
///
/// - `output_path`: directory receiving the workbooks
pub struct XlsxExporter {
    output_path: PathBuf,
}

impl XlsxExporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    /// Writes `report` to a workbook stamped with `at` and returns its path.
    ///
    /// ## Errors
    ///
    /// - **Output directory**: `ExportError::Io` if it cannot be created
    /// - **Workbook**: `ExportError::Xlsx` for any `rust_xlsxwriter` failure
    pub fn write(&self, report: &ReconciliationReport, at: DateTime<Local>) -> Result<PathBuf, ExportError> {
        info!("Creating xlsx file from product data");

        std::fs::create_dir_all(&self.output_path).map_err(|source| ExportError::Io {
            path: self.output_path.clone(),
            source,
        })?;

        let path = self.output_path.join(report_file_name(at));
        let mut workbook = build_workbook(report)?;
        workbook.save(&path)?;

        info!("Xlsx file saved to {}", path.display());
        Ok(path)
    }
}

impl ReportExporter for XlsxExporter {
    fn export(&self, report: &ReconciliationReport) -> Result<(), ExportError> {
        self.write(report, Local::now()).map(|_| ())
    }
}

pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("ScrapedProducts-{}.xlsx", at.format("%Y-%m-%d_%H-%M-%S"))
}

fn build_workbook(report: &ReconciliationReport) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let mut used_names = HashSet::new();

    if report.is_empty() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Report")?;
        write_sheet(worksheet, &[])?;
        return Ok(workbook);
    }

    for set in report.categories() {
        let name = unique_sheet_name(&set.category, &mut used_names);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;
        write_sheet(worksheet, &set.records)?;
    }

    Ok(workbook)
}

fn write_sheet(worksheet: &mut Worksheet, records: &[ResultRecord]) -> Result<(), XlsxError> {
    let header = Format::new().set_bold();
    let reference = Format::new().set_background_color(Color::RGB(GREEN));
    let observed = Format::new().set_background_color(Color::RGB(BLUE));
    let link = Format::new()
        .set_background_color(Color::RGB(BLUE))
        .set_font_color(Color::Blue)
        .set_underline(rust_xlsxwriter::FormatUnderline::Single);

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.len()).collect();
    for (col, title) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (idx, record) in records.iter().enumerate() {
        let row = idx as u32 + 1;
        let cells = display_cells(record);
        for (col, text) in cells.iter().enumerate() {
            widths[col] = widths[col].max(text.chars().count());
        }

        worksheet.write_string_with_format(row, 0, &record.name, &reference)?;
        worksheet.write_number_with_format(row, 1, record.nominal_price, &reference)?;
        worksheet.write_string_with_format(row, 2, &record.nominal_amount, &reference)?;

        match &record.observed {
            Some(o) => {
                worksheet.write_string_with_format(row, 3, &o.amount, &observed)?;
                worksheet.write_number_with_format(row, 4, o.lowest, &observed)?;
                worksheet.write_number_with_format(row, 5, o.highest, &observed)?;
            }
            None => {
                for col in 3..6 {
                    worksheet.write_blank(row, col, &observed)?;
                }
            }
        }

        if record.source_url.is_empty() {
            worksheet.write_blank(row, 6, &observed)?;
        } else {
            let url = Url::new(&record.source_url).set_tip("Click to open");
            worksheet.write_url_with_format(row, 6, url, &link)?;
        }
    }

    for (col, width) in widths.into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width as f64 + 2.0)?;
    }

    Ok(())
}

/// Cell texts of a row, used for column sizing
fn display_cells(record: &ResultRecord) -> [String; 7] {
    let price = |p: Option<f64>| p.map(|v| v.to_string()).unwrap_or_default();

    [
        record.name.clone(),
        record.nominal_price.to_string(),
        record.nominal_amount.clone(),
        record.observed_amount().unwrap_or_default().to_string(),
        price(record.lowest_observed_price()),
        price(record.highest_observed_price()),
        record.source_url.clone(),
    ]
}

/// Excel sheet name for a category: forbidden characters replaced, length capped,
/// suffixed when it collides with an earlier sheet.
pub fn unique_sheet_name(category: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = category
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').to_string();
    let base: String = if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME).collect()
    };

    let mut name = base.clone();
    let mut n = 2;
    while !used.insert(name.to_lowercase()) {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        name = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    name
}
