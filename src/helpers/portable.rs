//! `.xlsx` backend working on the file directly with umya-spreadsheet.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::{ExportFailure, InvoiceError, Result};
use crate::helpers::pdf;
use crate::helpers::workbook::{Backend, InvoiceWorkbook};
use crate::models::invoice::{CellRef, CellValue, layout};

pub struct PortableWorkbook {
    book: Option<Spreadsheet>,
    template: PathBuf,
    output_dir: PathBuf,
    saved: Option<PathBuf>,
}

impl PortableWorkbook {
    pub fn open(template: &Path, output_dir: &Path) -> Result<Self> {
        if !template.exists() {
            return Err(InvoiceError::TemplateMissing { path: template.to_path_buf() });
        }
        let book = umya_spreadsheet::reader::xlsx::read(template)
            .map_err(|e| InvoiceError::Workbook(format!("reading {}: {}", template.display(), e)))?;
        if book.get_sheet_collection().is_empty() {
            return Err(InvoiceError::Workbook("template has no worksheets".to_string()));
        }
        info!("Opened template {}", template.display());
        Ok(Self {
            book: Some(book),
            template: template.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            saved: None,
        })
    }

    fn sheet(&self) -> Option<&Worksheet> {
        self.book.as_ref()?.get_sheet(&0)
    }

    fn sheet_mut(&mut self) -> Option<&mut Worksheet> {
        self.book.as_mut()?.get_sheet_mut(&0)
    }
}

/// Days since 1899-12-30, the spreadsheet date epoch.
fn serial_date(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as f64
}

#[async_trait]
impl InvoiceWorkbook for PortableWorkbook {
    fn backend(&self) -> Backend {
        Backend::Portable
    }

    fn read(&self, cell: CellRef) -> CellValue {
        let Some(c) = self.sheet().and_then(|s| s.get_cell((cell.col, cell.row))) else {
            return CellValue::Empty;
        };
        let raw = c.get_value();
        let raw = raw.trim();
        if raw.is_empty() {
            CellValue::Empty
        } else if let Ok(number) = raw.parse::<f64>() {
            CellValue::Number(number)
        } else {
            CellValue::text(raw)
        }
    }

    fn write(&mut self, cell: CellRef, value: CellValue) {
        let Some(sheet) = self.sheet_mut() else {
            return;
        };
        let coord = (cell.col, cell.row);
        match value {
            // Blank keeps the template's borders; absent cells stay absent.
            CellValue::Empty => {
                if sheet.get_cell(coord).is_some() {
                    sheet.get_cell_mut(coord).set_blank();
                }
            }
            CellValue::Number(n) => {
                sheet.get_cell_mut(coord).set_value_number(n);
            }
            CellValue::Text(s) => {
                sheet.get_cell_mut(coord).set_value_string(s);
            }
            CellValue::Date(d) => {
                sheet.get_cell_mut(coord).set_value_number(serial_date(d));
                sheet
                    .get_style_mut(coord)
                    .get_number_format_mut()
                    .set_format_code(layout::DATE_FORMAT_CODE);
            }
        }
    }

    /// Writes the filled invoice under `<stem>.xlsx`, then the template in
    /// place so the invoice number and consultant name carry to the next run.
    async fn save(&mut self, stem: &str) -> Result<PathBuf> {
        let book = self
            .book
            .as_ref()
            .ok_or_else(|| InvoiceError::Workbook("workbook already closed".to_string()))?;
        let path = self.output_dir.join(format!("{}.xlsx", stem));
        for target in [&path, &self.template] {
            umya_spreadsheet::writer::xlsx::write(book, target).map_err(|e| {
                InvoiceError::Workbook(format!("writing {}: {}", target.display(), e))
            })?;
        }
        info!("Invoice filled and saved as Excel file: {}", path.display());
        self.saved = Some(path.clone());
        Ok(path)
    }

    async fn export_pdf(&mut self, stem: &str) -> std::result::Result<PathBuf, ExportFailure> {
        let Some(xlsx) = self.saved.clone() else {
            return Err(ExportFailure::OutputMissing {
                expected: self.output_dir.join(format!("{}.xlsx", stem)),
            });
        };
        // The in-memory copy is not needed once the file is on disk.
        self.book = None;
        pdf::convert_with_office(&xlsx, &self.output_dir.join(format!("{}.pdf", stem))).await
    }

    async fn close(&mut self) -> Result<()> {
        self.book = None;
        Ok(())
    }
}
