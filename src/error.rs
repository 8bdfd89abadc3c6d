//! Error types for the fetch → invoice pipeline.
//!
//! Terminal failures are `InvoiceError` variants. Conditions that must not
//! abort a run (row capacity, best-effort PDF conversion) are `Warning`s and
//! travel inside the render report instead.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a page driver implementation.
#[derive(Error, Debug)]
#[error("browser driver: {0}")]
pub struct DriverError(pub String);

impl DriverError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum InvoiceError {
    #[error("SpringAhead login failed: login information is invalid. Check company, username and password")]
    Authentication,

    #[error("navigation failed: {step} did not appear in time. Check credentials or whether the UI changed")]
    Navigation { step: &'static str },

    #[error("timecard table did not load in time")]
    Scrape,

    #[error("no entries to process; cannot compute a billing period")]
    EmptyInput,

    #[error(
        "consultant name is missing. Pass a full name override or type it into cell B6 of the invoice template"
    )]
    MissingConsultantName,

    #[error("missing credential: {field}")]
    MissingCredentials { field: &'static str },

    #[error("entry file not found: {path}")]
    EntryFileMissing { path: PathBuf },

    #[error("template not found: {path}")]
    TemplateMissing { path: PathBuf },

    #[error("PDF export failed: {reason}")]
    Export { reason: String, left_open: bool },

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed entry file: {0}")]
    Json(#[from] serde_json::Error),
}

impl InvoiceError {
    /// Extraction failures that end the run without any retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvoiceError::Authentication
                | InvoiceError::Navigation { .. }
                | InvoiceError::Scrape
                | InvoiceError::Driver(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, InvoiceError>;

/// A PDF export attempt that did not produce a document.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportFailure {
    ToolNotFound,
    ToolFailed { status: Option<i32>, output: String },
    OutputMissing { expected: PathBuf },
    InvalidPdf { path: PathBuf, reason: String },
    Native(String),
}

impl fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFailure::ToolNotFound => {
                write!(f, "LibreOffice was not found on PATH; skipping automatic PDF export")
            }
            ExportFailure::ToolFailed { status, output } => {
                write!(f, "LibreOffice PDF conversion failed (status {:?})", status)?;
                if !output.is_empty() {
                    write!(f, ": {}", output)?;
                }
                Ok(())
            }
            ExportFailure::OutputMissing { expected } => write!(
                f,
                "conversion reported success but {} was not found",
                expected.display()
            ),
            ExportFailure::InvalidPdf { path, reason } => {
                write!(f, "{} is not a readable PDF: {}", path.display(), reason)
            }
            ExportFailure::Native(msg) => write!(f, "Excel export failed: {}", msg),
        }
    }
}

/// Non-fatal condition surfaced to the caller as a status message.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    Capacity { written: usize, total: usize },
    Export(ExportFailure),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Capacity { written, total } => write!(
                f,
                "not enough rows in template to fit all entries ({} of {} written)",
                written, total
            ),
            Warning::Export(failure) => {
                write!(f, "{}; leaving the spreadsheet as the final artifact", failure)
            }
        }
    }
}
