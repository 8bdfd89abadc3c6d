use chrono::{NaiveDate, NaiveTime};
use std::fmt;

/// 1-based (row, column) address in the first worksheet of the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only columns A-Z are addressed by the layout.
        let letter = (b'A' + (self.col.saturating_sub(1) as u8)) as char;
        write!(f, "{}{}", letter, self.row)
    }
}

/// Fixed cell layout of the invoice template.
pub mod layout {
    use super::CellRef;

    pub const CONSULTANT_NAME: CellRef = CellRef::new(6, 2);
    pub const INVOICE_NUMBER: CellRef = CellRef::new(4, 5);
    pub const PERIOD_LABEL: CellRef = CellRef::new(5, 5);

    pub const FIRST_LINE_ROW: u32 = 9;
    pub const LAST_LINE_ROW: u32 = 38;

    pub const DATE_COL: u32 = 1;
    pub const FROM_COL: u32 = 2;
    pub const TO_COL: u32 = 3;
    pub const TASK_COL: u32 = 4;

    pub const TASK_LABEL: &str = "Remote IT Support";

    /// Number format applied to line-item dates by both backends.
    pub const DATE_FORMAT_CODE: &str = "m/d/yyyy";
}

/// Value read from or written to a template cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Non-empty trimmed text for string cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            CellValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Semi-monthly window an invoice covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingPeriod {
    pub month: u32,
    pub year: i32,
    pub start_day: u32,
    pub end_day: u32,
}

impl BillingPeriod {
    pub fn label(&self) -> String {
        format!(
            "{} - {} al {} - {}",
            self.month, self.start_day, self.end_day, self.year
        )
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Morning and afternoon intervals allocated to one worked day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBlock {
    pub morning_from: NaiveTime,
    pub morning_to: NaiveTime,
    pub afternoon_from: NaiveTime,
    pub afternoon_to: NaiveTime,
}

impl TimeBlock {
    /// 12-hour clock strings without a leading zero: `7:00 AM`, `4:15 PM`.
    pub fn formatted(&self) -> (String, String, String, String) {
        (
            clock(self.morning_from),
            clock(self.morning_to),
            clock(self.afternoon_from),
            clock(self.afternoon_to),
        )
    }
}

pub fn clock(t: NaiveTime) -> String {
    t.format("%-I:%M %p").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsultantName {
    pub full_name: String,
    pub short_name: String,
}
