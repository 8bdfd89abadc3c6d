use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format used by the timecard UI and the entry file, e.g. `11/2/2025`.
pub const ENTRY_DATE_FORMAT: &str = "%m/%d/%Y";

/// Login triple for the timesheet site. Never persisted by this crate.
#[derive(Clone)]
pub struct Credentials {
    pub company: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("company", &self.company)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One day of billable time scraped from the timecard.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkedDayEntry {
    #[serde(with = "us_date")]
    pub date: NaiveDate,
    pub hours: f64,
    pub project: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl fmt::Display for WorkedDayEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} hours | {} ({})",
            format_us_date(self.date),
            self.hours,
            self.project,
            self.kind
        )
    }
}

/// Worked days ordered ascending by date.
///
/// Every constructor sorts, including deserialization, so downstream code can
/// rely on `first()` being the earliest day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(from = "EntryFile")]
pub struct EntryCollection {
    entries: Vec<WorkedDayEntry>,
}

#[derive(Deserialize)]
struct EntryFile {
    #[serde(default)]
    entries: Vec<WorkedDayEntry>,
}

impl From<EntryFile> for EntryCollection {
    fn from(file: EntryFile) -> Self {
        EntryCollection::new(file.entries)
    }
}

impl EntryCollection {
    pub fn new(mut entries: Vec<WorkedDayEntry>) -> Self {
        entries.sort_by_key(|e| e.date);
        Self { entries }
    }

    pub fn entries(&self) -> &[WorkedDayEntry] {
        &self.entries
    }

    pub fn first(&self) -> Option<&WorkedDayEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WorkedDayEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a EntryCollection {
    type Item = &'a WorkedDayEntry;
    type IntoIter = std::slice::Iter<'a, WorkedDayEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub fn parse_us_date(text: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(text.trim(), ENTRY_DATE_FORMAT)
}

pub fn format_us_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

mod us_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_us_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_us_date(&raw)
            .map_err(|e| D::Error::custom(format!("invalid date '{}': {}", raw, e)))
    }
}
