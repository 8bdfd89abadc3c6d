//! Invoice template mutation shared by both rendering backends.
//!
//! Backends only know how to read, write, save and export cells of the first
//! worksheet; everything the invoice means lives here.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::error::{ExportFailure, InvoiceError, Result, Warning};
use crate::helpers::credentials::Prompter;
use crate::helpers::pdf;
use crate::helpers::transform::{
    artifact_stem, compute_time_blocks, next_invoice_number, parse_consultant_name,
};
use crate::models::entry::EntryCollection;
use crate::models::invoice::{BillingPeriod, CellRef, CellValue, ConsultantName, layout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Live office application driven through automation.
    Native,
    /// Direct manipulation of the `.xlsx` file.
    Portable,
}

#[async_trait]
pub trait InvoiceWorkbook: Send {
    fn backend(&self) -> Backend;

    fn read(&self, cell: CellRef) -> CellValue;

    fn write(&mut self, cell: CellRef, value: CellValue);

    /// Persists all writes and returns the spreadsheet artifact path.
    async fn save(&mut self, stem: &str) -> Result<PathBuf>;

    /// Produces `<stem>.pdf` from the saved document.
    async fn export_pdf(&mut self, stem: &str) -> std::result::Result<PathBuf, ExportFailure>;

    /// Releases the document handle.
    async fn close(&mut self) -> Result<()>;
}

/// Where the consultant's name may come from besides the template itself.
pub struct NameInput<'a> {
    pub override_name: Option<&'a str>,
    pub prompter: &'a mut dyn Prompter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilledInvoice {
    pub consultant: ConsultantName,
    pub invoice_number: i64,
    pub period_label: String,
    pub rows_written: usize,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub backend: Backend,
    pub consultant: ConsultantName,
    pub invoice_number: i64,
    pub period_label: String,
    pub rows_written: usize,
    pub spreadsheet: PathBuf,
    pub pdf: Option<PathBuf>,
    pub warnings: Vec<Warning>,
}

/// Override first (written back), then the stored cell value, then the
/// prompter until it yields a non-empty answer (written back).
pub fn resolve_consultant_name(
    workbook: &mut dyn InvoiceWorkbook,
    input: NameInput<'_>,
) -> Result<ConsultantName> {
    if let Some(name) = input.override_name.map(str::trim).filter(|n| !n.is_empty()) {
        info!("Using consultant name override: {}", name);
        workbook.write(layout::CONSULTANT_NAME, CellValue::text(name));
        return parse_consultant_name(name);
    }

    if let Some(stored) = workbook.read(layout::CONSULTANT_NAME).as_text() {
        return parse_consultant_name(&stored);
    }

    let mut question = "Enter your full name (first + one or two last names):";
    loop {
        match input.prompter.ask(question) {
            Some(answer) if !answer.trim().is_empty() => {
                let answer = answer.trim();
                workbook.write(layout::CONSULTANT_NAME, CellValue::text(answer));
                return parse_consultant_name(answer);
            }
            Some(_) => question = "Name cannot be empty. Please enter full name:",
            None => return Err(InvoiceError::MissingConsultantName),
        }
    }
}

/// Applies every cell mutation of one render.
pub fn fill_invoice(
    workbook: &mut dyn InvoiceWorkbook,
    entries: &EntryCollection,
    period: &BillingPeriod,
    name: NameInput<'_>,
) -> Result<FilledInvoice> {
    let consultant = resolve_consultant_name(workbook, name)?;

    let invoice_number = next_invoice_number(&workbook.read(layout::INVOICE_NUMBER));
    workbook.write(layout::INVOICE_NUMBER, CellValue::Number(invoice_number as f64));
    info!("Invoice number set to {}", invoice_number);

    let period_label = period.label();
    workbook.write(layout::PERIOD_LABEL, CellValue::text(period_label.clone()));

    for row in layout::FIRST_LINE_ROW..=layout::LAST_LINE_ROW {
        for col in layout::DATE_COL..=layout::TASK_COL {
            workbook.write(CellRef::new(row, col), CellValue::Empty);
        }
    }

    let mut warnings = Vec::new();
    let mut row = layout::FIRST_LINE_ROW;
    let mut written = 0;

    for entry in entries {
        if row + 1 > layout::LAST_LINE_ROW {
            warn!("Not enough rows in template to fit all entries");
            warnings.push(Warning::Capacity { written, total: entries.len() });
            break;
        }

        let (m_from, m_to, a_from, a_to) = compute_time_blocks(entry.hours).formatted();
        for (offset, from, to) in [(0, m_from, m_to), (1, a_from, a_to)] {
            let r = row + offset;
            workbook.write(CellRef::new(r, layout::DATE_COL), CellValue::Date(entry.date));
            workbook.write(CellRef::new(r, layout::FROM_COL), CellValue::Text(from));
            workbook.write(CellRef::new(r, layout::TO_COL), CellValue::Text(to));
            workbook.write(CellRef::new(r, layout::TASK_COL), CellValue::text(layout::TASK_LABEL));
        }

        row += 2;
        written += 1;
    }
    info!("Filled {} line item row(s) for {} entries", written * 2, written);

    Ok(FilledInvoice {
        consultant,
        invoice_number,
        period_label,
        rows_written: written * 2,
        warnings,
    })
}

/// Fills, saves and exports, releasing the document on every exit path.
///
/// A native export failure is returned as [`InvoiceError::Export`] with the
/// document left saved; a portable one degrades to a warning.
pub async fn render_invoice(
    workbook: &mut dyn InvoiceWorkbook,
    entries: &EntryCollection,
    period: &BillingPeriod,
    name: NameInput<'_>,
) -> Result<RenderReport> {
    let outcome = match fill_invoice(workbook, entries, period, name) {
        Ok(filled) => publish(workbook, filled, period).await,
        Err(e) => Err(e),
    };

    if let Err(e) = workbook.close().await {
        warn!("Failed to release workbook: {}", e);
    }
    if let Err(e) = &outcome {
        error!("Rendering failed: {}", e);
    }
    outcome
}

async fn publish(
    workbook: &mut dyn InvoiceWorkbook,
    filled: FilledInvoice,
    period: &BillingPeriod,
) -> Result<RenderReport> {
    let stem = artifact_stem(&filled.consultant.short_name, period);
    let spreadsheet = workbook.save(&stem).await?;
    info!("Invoice filled and saved: {}", spreadsheet.display());

    let mut warnings = filled.warnings;
    let backend = workbook.backend();

    let exported = match workbook.export_pdf(&stem).await {
        Ok(path) => pdf::verify_pdf(&path).map(|pages| {
            info!("Invoice exported to PDF ({} page(s)): {}", pages, path.display());
            path
        }),
        Err(failure) => Err(failure),
    };

    let pdf = match exported {
        Ok(path) => Some(path),
        Err(failure) if backend == Backend::Native => {
            return Err(InvoiceError::Export {
                reason: failure.to_string(),
                left_open: true,
            });
        }
        Err(failure) => {
            warn!("{}", failure);
            warnings.push(Warning::Export(failure));
            None
        }
    };

    Ok(RenderReport {
        backend,
        consultant: filled.consultant,
        invoice_number: filled.invoice_number,
        period_label: filled.period_label,
        rows_written: filled.rows_written,
        spreadsheet,
        pdf,
        warnings,
    })
}
