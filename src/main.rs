use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use springahead_invoice::helpers::credentials::{
    CredentialOverrides, NoPrompt, Prompter, TerminalPrompter,
};
use springahead_invoice::helpers::store::DEFAULT_ENTRY_FILE;
use springahead_invoice::service::{
    DEFAULT_TEMPLATE, DEFAULT_WEBDRIVER_URL, InvoiceConfig, InvoiceService, parse_headless,
};
use springahead_invoice::{InvoiceError, RenderReport};

#[derive(Parser)]
#[command(name = "springahead-invoice", version, about = "SpringAhead timecard to invoice")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(long, env = "SPRINGAHEAD_COMPANY")]
    company: Option<String>,

    #[arg(long, env = "SPRINGAHEAD_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "SPRINGAHEAD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// 0/false/no/off opens a visible browser window
    #[arg(
        long,
        env = "SPRINGAHEAD_HEADLESS",
        default_value = "1",
        value_parser = headless_flag,
        action = clap::ArgAction::Set
    )]
    headless: bool,

    /// Consultant full name; written into the template for future runs
    #[arg(long, env = "SPRINGAHEAD_FULL_NAME")]
    full_name: Option<String>,

    #[arg(long, env = "SPRINGAHEAD_WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
    webdriver_url: String,

    #[arg(long, default_value = DEFAULT_ENTRY_FILE)]
    entry_file: PathBuf,

    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    template: PathBuf,

    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Scrape the current timecard into the entry file
    Fetch,
    /// Fill the invoice template from the entry file
    Invoice,
    /// Fetch, then invoice
    Run,
}

fn headless_flag(raw: &str) -> Result<bool, Infallible> {
    Ok(parse_headless(raw))
}

impl Cli {
    fn config(&self) -> InvoiceConfig {
        InvoiceConfig {
            credentials: CredentialOverrides {
                company: self.company.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            },
            headless: self.headless,
            full_name_override: self.full_name.clone(),
            webdriver_url: self.webdriver_url.clone(),
            entry_file: self.entry_file.clone(),
            template: self.template.clone(),
            output_dir: self.output_dir.clone(),
            ..InvoiceConfig::default()
        }
    }
}

fn print_report(report: &RenderReport) {
    println!(
        "Invoice #{} for {} ({})",
        report.invoice_number, report.consultant.full_name, report.period_label
    );
    println!("  Spreadsheet: {}", report.spreadsheet.display());
    match &report.pdf {
        Some(pdf) => println!("  PDF: {}", pdf.display()),
        None => println!(
            "  No PDF was produced; open the spreadsheet in Excel/LibreOffice and export it manually."
        ),
    }
    for warning in &report.warnings {
        println!("  Warning: {}", warning);
    }
}

/// A native export failure leaves the saved invoice open in Excel; that is
/// reported as a recovery step, not a failed run.
fn finish(
    outcome: std::result::Result<RenderReport, InvoiceError>,
    what: &'static str,
) -> Result<()> {
    match outcome {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(InvoiceError::Export { reason, left_open: true }) => {
            println!("Export to PDF failed: {}", reason);
            println!("The invoice was saved; Excel is left open so you can export manually.");
            Ok(())
        }
        Err(e) => Err(e).context(what),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let service = InvoiceService::new(cli.config());

    let mut prompter: Box<dyn Prompter> = if TerminalPrompter::is_available() {
        Box::new(TerminalPrompter)
    } else {
        Box::new(NoPrompt)
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Fetch => {
            let entries = service.fetch(prompter.as_mut()).await.context("fetching timecard")?;
            if entries.is_empty() {
                println!("No worked days with hours > 0 found on this timecard.");
            } else {
                println!("Worked days on current timecard (hours > 0):");
                for entry in &entries {
                    println!("- {}", entry);
                }
                println!("Saved data to {}", service.config.entry_file.display());
            }
        }
        Command::Invoice => {
            let outcome = service.invoice(prompter.as_mut()).await;
            finish(outcome, "filling invoice")?;
        }
        Command::Run => {
            let outcome = service.run(prompter.as_mut()).await;
            if outcome.is_ok() {
                info!("All steps completed successfully");
            }
            finish(outcome, "timesheet automation failed")?;
        }
    }

    Ok(())
}
