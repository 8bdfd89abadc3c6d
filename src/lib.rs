//! SpringAhead Invoice Library
//!
//! This library logs into SpringAhead, extracts the current timecard's worked
//! days, and fills the consultant invoice spreadsheet from them, exporting a
//! PDF when an office suite is available.

pub mod error;
pub mod helpers;
pub mod models;
pub mod service;

pub use error::{InvoiceError, Warning};
pub use service::{InvoiceConfig, InvoiceService};

// Re-export key types for convenience
pub use helpers::springahead::{Extractor, PageDriver, Selector};
pub use helpers::workbook::{InvoiceWorkbook, RenderReport};
pub use models::entry::{Credentials, EntryCollection, WorkedDayEntry};
