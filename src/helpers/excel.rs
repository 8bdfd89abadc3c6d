//! Native backend: a live Excel instance driven over COM through PowerShell.
//!
//! Reads happen once at open; writes are buffered and replayed against the
//! live workbook on save, then the open instance exports the PDF.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::error::{ExportFailure, InvoiceError, Result};
use crate::helpers::workbook::{Backend, InvoiceWorkbook};
use crate::models::invoice::{CellRef, CellValue, layout};

const POWERSHELL: &str = "powershell";
/// RPC_E_CALL_REJECTED: Excel is busy with a modal dialog or another client.
const CALL_REJECTED: &str = "0x80010001";
const EXPORT_FAILED_EXIT: i32 = 3;

pub struct ExcelWorkbook {
    template: PathBuf,
    output_dir: PathBuf,
    snapshot: Vec<(CellRef, CellValue)>,
    pending: Vec<(CellRef, CellValue)>,
    left_open: bool,
}

#[derive(Deserialize)]
struct Snapshot {
    name: Option<serde_json::Value>,
    number: Option<serde_json::Value>,
}

impl ExcelWorkbook {
    /// True when PowerShell can resolve the `Excel.Application` COM class.
    pub async fn is_available() -> bool {
        if !cfg!(windows) {
            return false;
        }
        let check = "if ([type]::GetTypeFromProgID('Excel.Application')) { exit 0 } else { exit 1 }";
        match run_script(check).await {
            Ok(out) => out.status.success(),
            Err(e) => {
                debug!("PowerShell ProgID check failed: {}", e);
                false
            }
        }
    }

    pub async fn open(template: &Path, output_dir: &Path) -> Result<Self> {
        if !template.exists() {
            return Err(InvoiceError::TemplateMissing { path: template.to_path_buf() });
        }
        let template = std::path::absolute(template)?;
        let output_dir = std::path::absolute(output_dir)?;

        let script = format!(
            "{open}\n\
             $out = @{{ name = $ws.Cells.Item({nr},{nc}).Value2; number = $ws.Cells.Item({ir},{ic}).Value2 }}\n\
             $wb.Close($false); $excel.Quit()\n\
             $out | ConvertTo-Json -Compress",
            open = open_workbook(&template, false),
            nr = layout::CONSULTANT_NAME.row,
            nc = layout::CONSULTANT_NAME.col,
            ir = layout::INVOICE_NUMBER.row,
            ic = layout::INVOICE_NUMBER.col,
        );
        let out = run_script(&script).await?;
        if !out.status.success() {
            return Err(InvoiceError::Workbook(com_failure(&out)));
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        let snap: Snapshot = serde_json::from_str(stdout.trim())?;
        info!("Opened {} in Excel", template.display());

        Ok(Self {
            template,
            output_dir,
            snapshot: vec![
                (layout::CONSULTANT_NAME, json_cell(snap.name)),
                (layout::INVOICE_NUMBER, json_cell(snap.number)),
            ],
            pending: Vec::new(),
            left_open: false,
        })
    }
}

fn json_cell(value: Option<serde_json::Value>) -> CellValue {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => CellValue::Text(s),
        _ => CellValue::Empty,
    }
}

fn ps_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn ps_value(value: &CellValue) -> String {
    match value {
        CellValue::Empty => "$null".to_string(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Text(s) => ps_quote(s),
        CellValue::Date(d) => format!("([datetime]'{}').ToOADate()", d.format("%Y-%m-%d")),
    }
}

/// Dates also get the template's date format so a General cell does not
/// show the raw serial.
fn write_cell(cell: CellRef, value: &CellValue) -> String {
    let target = format!("$ws.Cells.Item({},{})", cell.row, cell.col);
    let assign = format!("{}.Value2 = {}", target, ps_value(value));
    match value {
        CellValue::Date(_) => format!(
            "{}; {}.NumberFormat = {}",
            assign,
            target,
            ps_quote(layout::DATE_FORMAT_CODE)
        ),
        _ => assign,
    }
}

fn open_workbook(path: &Path, visible: bool) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'\n\
         $excel = New-Object -ComObject Excel.Application\n\
         $excel.Visible = ${visible}\n\
         $excel.DisplayAlerts = $false\n\
         $wb = $excel.Workbooks.Open({path})\n\
         $ws = $wb.Worksheets.Item(1)",
        visible = visible,
        path = ps_quote(&path.display().to_string()),
    )
}

async fn run_script(script: &str) -> std::io::Result<std::process::Output> {
    Command::new(POWERSHELL)
        .args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-Command", script])
        .output()
        .await
}

fn com_failure(out: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    if stderr.contains(CALL_REJECTED) {
        "Excel rejected the automation call. Close all Excel windows and any EXCEL.EXE processes, then try again".to_string()
    } else if stderr.is_empty() {
        format!("PowerShell exited with {}", out.status)
    } else {
        stderr
    }
}

#[async_trait]
impl InvoiceWorkbook for ExcelWorkbook {
    fn backend(&self) -> Backend {
        Backend::Native
    }

    fn read(&self, cell: CellRef) -> CellValue {
        self.snapshot
            .iter()
            .chain(self.pending.iter())
            .rev()
            .find(|(c, _)| *c == cell)
            .map(|(_, v)| v.clone())
            .unwrap_or(CellValue::Empty)
    }

    fn write(&mut self, cell: CellRef, value: CellValue) {
        self.pending.push((cell, value));
    }

    /// Replays buffered writes and saves the template in place.
    async fn save(&mut self, _stem: &str) -> Result<PathBuf> {
        let mut script = open_workbook(&self.template, false);
        for (cell, value) in &self.pending {
            script.push('\n');
            script.push_str(&write_cell(*cell, value));
        }
        script.push_str("\n$wb.Save(); $wb.Close($false); $excel.Quit()");

        info!("Writing {} cell(s) through Excel", self.pending.len());
        let out = run_script(&script).await?;
        if !out.status.success() {
            let msg = com_failure(&out);
            error!("Excel save failed: {}", msg);
            return Err(InvoiceError::Workbook(msg));
        }
        self.pending.clear();
        Ok(self.template.clone())
    }

    /// On failure Excel stays visible with the saved workbook open.
    async fn export_pdf(&mut self, stem: &str) -> std::result::Result<PathBuf, ExportFailure> {
        let pdf_path = self.output_dir.join(format!("{}.pdf", stem));
        let script = format!(
            "{open}\n\
             try {{\n\
               $ws.ExportAsFixedFormat(0, {pdf}, 0, $true, $false)\n\
               $wb.Close($false); $excel.Quit()\n\
             }} catch {{\n\
               $excel.Visible = $true\n\
               [Console]::Error.WriteLine($_.Exception.Message)\n\
               exit {code}\n\
             }}",
            open = open_workbook(&self.template, false),
            pdf = ps_quote(&pdf_path.display().to_string()),
            code = EXPORT_FAILED_EXIT,
        );

        let out = run_script(&script)
            .await
            .map_err(|e| ExportFailure::Native(e.to_string()))?;
        if out.status.success() {
            return Ok(pdf_path);
        }
        if out.status.code() == Some(EXPORT_FAILED_EXIT) {
            self.left_open = true;
            warn!(
                "Export to {} failed; leaving Excel open so you can export manually",
                pdf_path.display()
            );
        }
        Err(ExportFailure::Native(com_failure(&out)))
    }

    async fn close(&mut self) -> Result<()> {
        if self.left_open {
            info!("Workbook left open in Excel for manual recovery");
        }
        Ok(())
    }
}
