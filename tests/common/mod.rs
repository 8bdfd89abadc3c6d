#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use springahead_invoice::error::DriverError;
use springahead_invoice::helpers::springahead::{ExtractTimeouts, selectors};
use springahead_invoice::{Credentials, PageDriver, Selector};

#[derive(Default, Debug)]
pub struct PageLog {
    pub visited: Vec<String>,
    pub filled: Vec<(Selector, String)>,
    pub clicked: Vec<Selector>,
    pub screenshots: Vec<PathBuf>,
    pub closed: bool,
}

/// Scripted stand-in for a browser page.
pub struct FakePage {
    pub present: HashSet<Selector>,
    pub login_error: bool,
    pub rows: Vec<Vec<String>>,
    pub log: Arc<Mutex<PageLog>>,
}

impl FakePage {
    /// A site where every step of the walk succeeds.
    pub fn healthy(rows: &[[&str; 4]]) -> Self {
        let present = [
            selectors::COMPANY,
            selectors::USERNAME,
            selectors::PASSWORD,
            selectors::ADD_TIME,
            selectors::ENTER_TIME_FOR,
            selectors::TABLE,
        ]
        .into_iter()
        .collect();

        Self {
            present,
            login_error: false,
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            log: Arc::new(Mutex::new(PageLog::default())),
        }
    }

    pub fn without(mut self, selector: Selector) -> Self {
        self.present.remove(&selector);
        self
    }

    pub fn with_login_error(mut self) -> Self {
        self.login_error = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<PageLog>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.log.lock().unwrap().visited.push(url.to_string());
        Ok(())
    }

    async fn wait_for(&mut self, selector: Selector, _timeout: Duration) -> Result<bool, DriverError> {
        Ok(self.present.contains(&selector))
    }

    async fn fill(&mut self, selector: Selector, value: &str) -> Result<(), DriverError> {
        self.log.lock().unwrap().filled.push((selector, value.to_string()));
        Ok(())
    }

    async fn click(&mut self, selector: Selector) -> Result<(), DriverError> {
        self.log.lock().unwrap().clicked.push(selector);
        Ok(())
    }

    async fn is_visible(&mut self, selector: Selector) -> Result<bool, DriverError> {
        Ok(selector == selectors::LOGIN_ERROR && self.login_error)
    }

    async fn settle(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn pause(&mut self, _duration: Duration) {}

    async fn read_rows(
        &mut self,
        _row: Selector,
        fields: &[Selector],
    ) -> Result<Vec<Vec<String>>, DriverError> {
        assert_eq!(fields.len(), 4);
        Ok(self.rows.clone())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError> {
        self.log.lock().unwrap().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

pub fn creds() -> Credentials {
    Credentials {
        company: "acme".to_string(),
        username: "jperez".to_string(),
        password: "s3cret".to_string(),
    }
}

pub fn instant_timeouts() -> ExtractTimeouts {
    ExtractTimeouts {
        element: Duration::ZERO,
        table: Duration::ZERO,
        settle: Duration::ZERO,
    }
}

/// Minimal invoice template: name in B6, invoice number in E4.
pub fn write_template(path: &Path, name: Option<&str>, number: Option<f64>) {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.get_sheet_mut(&0).unwrap();
    if let Some(name) = name {
        sheet.get_cell_mut("B6").set_value_string(name);
    }
    if let Some(number) = number {
        sheet.get_cell_mut("E4").set_value_number(number);
    }
    sheet.get_cell_mut("A20").set_value_string("left over from last month");
    umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
}

pub fn cell_text(path: &Path, coord: &str) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
    let sheet = book.get_sheet(&0).unwrap();
    sheet
        .get_cell(coord)
        .map(|c| c.get_value().to_string())
        .unwrap_or_default()
}
