use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::error::{InvoiceError, Result};
use crate::helpers::browser::WebDriverPage;
use crate::helpers::credentials::{CredentialOverrides, Prompter, resolve_credentials};
use crate::helpers::excel::ExcelWorkbook;
use crate::helpers::portable::PortableWorkbook;
use crate::helpers::springahead::{ExtractTimeouts, Extractor, LOGIN_URL, PageDriver};
use crate::helpers::store::{self, DEFAULT_ENTRY_FILE};
use crate::helpers::transform::detect_period;
use crate::helpers::workbook::{InvoiceWorkbook, NameInput, RenderReport, render_invoice};
use crate::models::entry::{Credentials, EntryCollection};
use crate::models::invoice::BillingPeriod;

pub const DEFAULT_TEMPLATE: &str = "INVOICE (Template).xlsx";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct InvoiceConfig {
    pub credentials: CredentialOverrides,
    pub headless: bool,
    pub full_name_override: Option<String>,
    pub webdriver_url: String,
    pub login_url: String,
    pub entry_file: PathBuf,
    pub template: PathBuf,
    pub output_dir: PathBuf,
    pub timeouts: ExtractTimeouts,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialOverrides::default(),
            headless: true,
            full_name_override: None,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            login_url: LOGIN_URL.to_string(),
            entry_file: PathBuf::from(DEFAULT_ENTRY_FILE),
            template: PathBuf::from(DEFAULT_TEMPLATE),
            output_dir: PathBuf::from("."),
            timeouts: ExtractTimeouts::default(),
        }
    }
}

/// `SPRINGAHEAD_HEADLESS`-style toggle: `0`, `false`, `no`, `off` mean visible.
pub fn parse_headless(raw: &str) -> bool {
    !matches!(raw.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off")
}

/// Runs the fetch and invoice steps of the pipeline
pub struct InvoiceService {
    pub config: InvoiceConfig,
}

impl InvoiceService {
    pub fn new(config: InvoiceConfig) -> Self {
        info!("Creating new InvoiceService instance");
        Self { config }
    }

    /// Logs in, scrapes the current timecard and saves it to the entry file.
    pub async fn fetch(&self, prompter: &mut dyn Prompter) -> Result<EntryCollection> {
        let creds = resolve_credentials(&self.config.credentials, prompter)?;
        let page = WebDriverPage::connect(&self.config.webdriver_url, self.config.headless).await?;
        self.fetch_with(page, &creds).await
    }

    pub async fn fetch_with<D: PageDriver>(
        &self,
        driver: D,
        creds: &Credentials,
    ) -> Result<EntryCollection> {
        let mut extractor = Extractor::new(driver)
            .with_login_url(self.config.login_url.clone())
            .with_timeouts(self.config.timeouts)
            .with_screenshot_dir(self.config.output_dir.clone());

        let entries = extractor.fetch_worked_days(creds).await?;

        if entries.is_empty() {
            warn!("No worked days with hours > 0 found on this timecard");
            return Ok(entries);
        }
        store::save_entries(&self.config.entry_file, &entries)?;
        Ok(entries)
    }

    /// Picks the backend once: live Excel when the machine has it, the file
    /// backend otherwise.
    pub async fn open_workbook(&self) -> Result<Box<dyn InvoiceWorkbook>> {
        let cfg = &self.config;
        if ExcelWorkbook::is_available().await {
            info!("Excel automation available; using native backend");
            Ok(Box::new(ExcelWorkbook::open(&cfg.template, &cfg.output_dir).await?))
        } else {
            info!("Excel automation unavailable; using portable .xlsx backend");
            Ok(Box::new(PortableWorkbook::open(&cfg.template, &cfg.output_dir)?))
        }
    }

    /// Fills the invoice template from the saved entry file and exports it.
    pub async fn invoice(&self, prompter: &mut dyn Prompter) -> Result<RenderReport> {
        let (entries, period) = self.prepare()?;
        let mut workbook = self.open_workbook().await?;
        self.render(workbook.as_mut(), &entries, &period, prompter).await
    }

    pub async fn invoice_with(
        &self,
        workbook: &mut dyn InvoiceWorkbook,
        prompter: &mut dyn Prompter,
    ) -> Result<RenderReport> {
        let (entries, period) = self.prepare()?;
        self.render(workbook, &entries, &period, prompter).await
    }

    /// Fetch, then invoice. Nothing is rendered if the fetch fails or finds
    /// no worked days.
    pub async fn run(&self, prompter: &mut dyn Prompter) -> Result<RenderReport> {
        info!("[1/2] Fetching hours from SpringAhead...");
        let fetched = self.fetch(prompter).await;
        self.finish_run(fetched, prompter).await
    }

    /// [`InvoiceService::run`] over an already connected page driver.
    pub async fn run_with<D: PageDriver>(
        &self,
        driver: D,
        creds: &Credentials,
        prompter: &mut dyn Prompter,
    ) -> Result<RenderReport> {
        info!("[1/2] Fetching hours from SpringAhead...");
        let fetched = self.fetch_with(driver, creds).await;
        self.finish_run(fetched, prompter).await
    }

    async fn finish_run(
        &self,
        fetched: Result<EntryCollection>,
        prompter: &mut dyn Prompter,
    ) -> Result<RenderReport> {
        let fetched =
            fetched.inspect_err(|e| error!("Step 1 (SpringAhead fetch) failed: {}", e))?;
        if fetched.is_empty() {
            error!("Nothing to invoice; skipping step 2");
            return Err(InvoiceError::EmptyInput);
        }

        info!("[2/2] Filling invoice and exporting PDF...");
        self.invoice(prompter)
            .await
            .inspect_err(|e| error!("Step 2 (invoice) failed: {}", e))
    }

    fn prepare(&self) -> Result<(EntryCollection, BillingPeriod)> {
        let entries = store::load_entries(&self.config.entry_file)?;
        let period = detect_period(&entries)?;
        if !self.config.template.exists() {
            return Err(InvoiceError::TemplateMissing { path: self.config.template.clone() });
        }
        Ok((entries, period))
    }

    async fn render(
        &self,
        workbook: &mut dyn InvoiceWorkbook,
        entries: &EntryCollection,
        period: &BillingPeriod,
        prompter: &mut dyn Prompter,
    ) -> Result<RenderReport> {
        let name = NameInput {
            override_name: self.config.full_name_override.as_deref(),
            prompter,
        };
        let report = render_invoice(workbook, entries, period, name).await?;
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        Ok(report)
    }
}
