use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::error::{InvoiceError, Result};
use crate::models::entry::EntryCollection;

pub const DEFAULT_ENTRY_FILE: &str = "springahead_current_week.json";

pub fn save_entries(path: &Path, entries: &EntryCollection) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)?;
    fs::write(path, json)?;
    info!("Saved {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Loads the entry file; its absence is a precondition failure.
pub fn load_entries(path: &Path) -> Result<EntryCollection> {
    if !path.exists() {
        error!("Entry file not found: {}", path.display());
        return Err(InvoiceError::EntryFileMissing { path: path.to_path_buf() });
    }
    let text = fs::read_to_string(path)?;
    match serde_json::from_str::<EntryCollection>(&text) {
        Ok(entries) => {
            info!("Loaded {} entries from {}", entries.len(), path.display());
            Ok(entries)
        }
        Err(e) => {
            error!("Failed to parse {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entry::{WorkedDayEntry, parse_us_date};

    fn sample() -> EntryCollection {
        EntryCollection::new(vec![
            WorkedDayEntry {
                date: parse_us_date("11/3/2025").unwrap(),
                hours: 8.0,
                project: "Acme".into(),
                kind: "Regular".into(),
            },
            WorkedDayEntry {
                date: parse_us_date("11/2/2025").unwrap(),
                hours: 8.25,
                project: "Acme".into(),
                kind: "Overtime".into(),
            },
        ])
    }

    #[test]
    fn test_save_then_load_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_ENTRY_FILE);
        let original = sample();

        save_entries(&path, &original).unwrap();
        let loaded = load_entries(&path).unwrap();

        assert_eq!(loaded, original);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"date\": \"11/2/2025\""));
    }

    #[test]
    fn test_load_sorts_unordered_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");
        fs::write(
            &path,
            r#"{"entries":[{"date":"11/9/2025","hours":8,"project":"A","type":"R"},
                           {"date":"11/10/2025","hours":8,"project":"A","type":"R"},
                           {"date":"11/1/2025","hours":8,"project":"A","type":"R"}]}"#,
        )
        .unwrap();

        let days: Vec<u32> = load_entries(&path)
            .unwrap()
            .iter()
            .map(|e| chrono::Datelike::day(&e.date))
            .collect();
        assert_eq!(days, vec![1, 9, 10]);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            load_entries(&missing),
            Err(InvoiceError::EntryFileMissing { .. })
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"entries":[{"date":"2025-11-01","hours":8}]}"#).unwrap();
        assert!(matches!(load_entries(&bad), Err(InvoiceError::Json(_))));
    }
}
