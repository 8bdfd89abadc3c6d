//! Timecard extraction from SpringAhead.
//!
//! The login → Add Time → List view → table walk is a linear state machine
//! over a [`PageDriver`], so it runs against a real browser (see
//! [`crate::helpers::browser`]) or a scripted fake in tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{DriverError, InvoiceError, Result};
use crate::models::entry::{Credentials, EntryCollection, WorkedDayEntry, parse_us_date};

pub const LOGIN_URL: &str =
    "https://my.springahead.com/go/Account/Logon?ReturnUrl=%2Fvt%2Fgo%3FHome%26tokenid%3Dvte";

pub const LOGIN_ERROR_SCREENSHOT: &str = "springahead_login_error.png";

/// How an element on the page is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(&'static str),
    /// Element whose own text equals the string.
    ExactText(&'static str),
    /// Element whose own text contains the string.
    ContainsText(&'static str),
}

pub mod selectors {
    use super::Selector;

    pub const COMPANY: Selector = Selector::Css("#login_body input#CompanyLogin");
    pub const USERNAME: Selector = Selector::Css("#login_body input#UserName");
    pub const PASSWORD: Selector = Selector::Css("#login_body input#Password");
    pub const LOG_IN: Selector = Selector::ExactText("Log In");
    pub const LOGIN_ERROR: Selector =
        Selector::ContainsText("Login information entered is invalid. Please try again.");
    pub const ADD_TIME: Selector = Selector::ExactText("Add Time");
    pub const ENTER_TIME_FOR: Selector = Selector::ContainsText("Enter Time for");
    pub const LIST_VIEW: Selector = Selector::ExactText("List");
    pub const TABLE: Selector = Selector::Css("table.timedayTable");
    pub const ROW: Selector = Selector::Css("table.timedayTable tr.timeRow");

    /// Per-row fields, in the order `read_rows` returns them.
    pub const ROW_FIELDS: [Selector; 4] = [
        Selector::Css(".timedayDate"),
        Selector::Css("span.timedayProject"),
        Selector::Css("td.timedayType .timedayType"),
        Selector::Css("td.timedayHours"),
    ];
}

/// Browser automation surface needed by the extractor.
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> std::result::Result<(), DriverError>;

    /// Blocks until the element exists or `timeout` elapses; `Ok(false)` on timeout.
    async fn wait_for(
        &mut self,
        selector: Selector,
        timeout: Duration,
    ) -> std::result::Result<bool, DriverError>;

    async fn fill(&mut self, selector: Selector, value: &str) -> std::result::Result<(), DriverError>;

    async fn click(&mut self, selector: Selector) -> std::result::Result<(), DriverError>;

    async fn is_visible(&mut self, selector: Selector) -> std::result::Result<bool, DriverError>;

    /// Waits for network and rendering to go quiet after a navigation.
    async fn settle(&mut self) -> std::result::Result<(), DriverError>;

    async fn pause(&mut self, duration: Duration);

    /// Trimmed inner text of `fields` within every element matching `row`.
    /// A missing field reads as an empty string.
    async fn read_rows(
        &mut self,
        row: Selector,
        fields: &[Selector],
    ) -> std::result::Result<Vec<Vec<String>>, DriverError>;

    async fn screenshot(&mut self, path: &Path) -> std::result::Result<(), DriverError>;

    async fn close(&mut self) -> std::result::Result<(), DriverError>;
}

/// Upper bounds for each blocking wait.
#[derive(Debug, Clone, Copy)]
pub struct ExtractTimeouts {
    pub element: Duration,
    pub table: Duration,
    pub settle: Duration,
}

impl Default for ExtractTimeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(15),
            table: Duration::from_secs(20),
            settle: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractState {
    Unauthenticated,
    LoginSubmitted,
    AuthenticatedHome,
    TimeEntryLoaded,
    ListViewActive,
    RowsScraped,
}

pub struct Extractor<D: PageDriver> {
    driver: D,
    login_url: String,
    timeouts: ExtractTimeouts,
    screenshot_dir: PathBuf,
    state: ExtractState,
}

impl<D: PageDriver> Extractor<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            login_url: LOGIN_URL.to_string(),
            timeouts: ExtractTimeouts::default(),
            screenshot_dir: PathBuf::from("."),
            state: ExtractState::Unauthenticated,
        }
    }

    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: ExtractTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    pub fn state(&self) -> ExtractState {
        self.state
    }

    /// Runs the whole walk and closes the browser session on every exit path.
    pub async fn fetch_worked_days(&mut self, creds: &Credentials) -> Result<EntryCollection> {
        let outcome = self.walk(creds).await;

        if let Err(e) = self.driver.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        match &outcome {
            Ok(entries) => info!("Extraction finished with {} worked day(s)", entries.len()),
            Err(e) => error!("Extraction aborted in state {:?}: {}", self.state, e),
        }
        outcome
    }

    async fn walk(&mut self, creds: &Credentials) -> Result<EntryCollection> {
        self.log_in(creds).await?;
        self.open_time_entry().await?;
        self.switch_to_list_view().await?;
        let entries = self.scrape_rows().await?;
        Ok(entries)
    }

    async fn log_in(&mut self, creds: &Credentials) -> Result<()> {
        info!("Opening login page...");
        self.driver.goto(&self.login_url).await?;

        for field in [selectors::COMPANY, selectors::USERNAME, selectors::PASSWORD] {
            if !self.driver.wait_for(field, self.timeouts.element).await? {
                return Err(InvoiceError::Navigation { step: "login form" });
            }
        }

        info!("Filling login form...");
        self.driver.fill(selectors::COMPANY, &creds.company).await?;
        self.driver.fill(selectors::USERNAME, &creds.username).await?;
        self.driver.fill(selectors::PASSWORD, &creds.password).await?;
        self.driver.click(selectors::LOG_IN).await?;
        self.driver.settle().await?;
        self.transition(ExtractState::LoginSubmitted);

        if self.driver.is_visible(selectors::LOGIN_ERROR).await? {
            let shot = self.screenshot_dir.join(LOGIN_ERROR_SCREENSHOT);
            match self.driver.screenshot(&shot).await {
                Ok(()) => info!("Saved login error screenshot to {}", shot.display()),
                Err(e) => warn!("Could not save login error screenshot: {}", e),
            }
            return Err(InvoiceError::Authentication);
        }
        Ok(())
    }

    async fn open_time_entry(&mut self) -> Result<()> {
        if !self.driver.wait_for(selectors::ADD_TIME, self.timeouts.element).await? {
            return Err(InvoiceError::Navigation { step: "'Add Time'" });
        }
        self.transition(ExtractState::AuthenticatedHome);

        info!("Clicking 'Add Time' to open current timecard...");
        self.driver.click(selectors::ADD_TIME).await?;

        if !self
            .driver
            .wait_for(selectors::ENTER_TIME_FOR, self.timeouts.element)
            .await?
        {
            return Err(InvoiceError::Navigation { step: "'Enter Time for'" });
        }
        self.driver.pause(self.timeouts.settle).await;
        self.transition(ExtractState::TimeEntryLoaded);
        Ok(())
    }

    async fn switch_to_list_view(&mut self) -> Result<()> {
        // Week view is the default and does not expose one row per day.
        info!("Switching to List view...");
        self.driver.click(selectors::LIST_VIEW).await?;
        self.driver.pause(self.timeouts.settle).await;
        self.transition(ExtractState::ListViewActive);
        Ok(())
    }

    async fn scrape_rows(&mut self) -> Result<EntryCollection> {
        info!("Waiting for timecard table to load...");
        if !self.driver.wait_for(selectors::TABLE, self.timeouts.table).await? {
            return Err(InvoiceError::Scrape);
        }

        let rows = self.driver.read_rows(selectors::ROW, &selectors::ROW_FIELDS).await?;
        info!("Found {} time row(s) on the page", rows.len());

        let entries: Vec<WorkedDayEntry> = rows.iter().filter_map(|r| parse_row(r)).collect();
        self.transition(ExtractState::RowsScraped);

        for entry in &entries {
            info!("- {}", entry);
        }
        Ok(EntryCollection::new(entries))
    }

    fn transition(&mut self, next: ExtractState) {
        info!("Extractor state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Turns one `[date, project, type, hours]` row into an entry, or `None`
/// when the row carries no billable time.
pub fn parse_row(fields: &[String]) -> Option<WorkedDayEntry> {
    let field = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");
    let (date_text, project, kind, hours_text) = (field(0), field(1), field(2), field(3));

    if hours_text.is_empty() {
        return None;
    }
    let hours = match hours_text.parse::<f64>() {
        Ok(h) => h,
        Err(_) => {
            warn!("Skipping row with non-numeric hours: {:?}", hours_text);
            return None;
        }
    };
    if !(hours > 0.0) || !hours.is_finite() {
        return None;
    }
    let date = match parse_us_date(date_text) {
        Ok(d) => d,
        Err(e) => {
            warn!("Skipping row with unreadable date {:?}: {}", date_text, e);
            return None;
        }
    };

    Some(WorkedDayEntry {
        date,
        hours,
        project: project.to_string(),
        kind: kind.to_string(),
    })
}
