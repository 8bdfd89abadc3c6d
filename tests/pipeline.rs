mod common;

use common::{FakePage, cell_text, creds, instant_timeouts, write_template};
use springahead_invoice::helpers::credentials::NoPrompt;
use springahead_invoice::helpers::portable::PortableWorkbook;
use springahead_invoice::helpers::store::load_entries;
use springahead_invoice::helpers::workbook::Backend;
use springahead_invoice::{InvoiceConfig, InvoiceError, InvoiceService, Warning};
use std::path::Path;

fn service(dir: &Path) -> InvoiceService {
    InvoiceService::new(InvoiceConfig {
        entry_file: dir.join("springahead_current_week.json"),
        template: dir.join("INVOICE (Template).xlsx"),
        output_dir: dir.to_path_buf(),
        timeouts: instant_timeouts(),
        ..InvoiceConfig::default()
    })
}

async fn render(svc: &InvoiceService) -> Result<springahead_invoice::RenderReport, InvoiceError> {
    let mut workbook = PortableWorkbook::open(&svc.config.template, &svc.config.output_dir)?;
    svc.invoice_with(&mut workbook, &mut NoPrompt).await
}

#[tokio::test]
async fn test_fetch_then_invoice_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut svc = service(dir.path());
    svc.config.full_name_override = Some("Juan O. Perez".to_string());
    write_template(&svc.config.template, None, Some(4.0));

    let page = FakePage::healthy(&[
        ["11/3/2025", "Acme Corp", "Remote", "8.0"],
        ["11/2/2025", "Acme Corp", "Remote", "8.25"],
    ]);
    let fetched = svc.fetch_with(page, &creds()).await.unwrap();
    assert_eq!(fetched.len(), 2);
    assert_eq!(load_entries(&svc.config.entry_file).unwrap(), fetched);

    let report = render(&svc).await.unwrap();
    assert_eq!(report.backend, Backend::Portable);
    assert_eq!(report.invoice_number, 5);
    assert_eq!(report.period_label, "11 - 1 al 15 - 2025");
    assert_eq!(report.consultant.short_name, "J. Perez");
    assert_eq!(report.rows_written, 4);

    let out = &report.spreadsheet;
    assert_eq!(
        out.file_name().unwrap(),
        "J. Perez INV (11 - 1 al 15 - 2025).xlsx"
    );
    assert_eq!(cell_text(out, "B6"), "Juan O. Perez");
    assert_eq!(cell_text(out, "E4"), "5");
    assert_eq!(cell_text(out, "E5"), "11 - 1 al 15 - 2025");

    // 11/2 was scraped second but fills first
    assert_eq!(cell_text(out, "A9"), "45963");
    assert_eq!(cell_text(out, "A11"), "45964");
    assert_eq!(cell_text(out, "B9"), "7:00 AM");
    assert_eq!(cell_text(out, "C9"), "11:00 AM");
    assert_eq!(cell_text(out, "B10"), "12:00 PM");
    assert_eq!(cell_text(out, "C10"), "4:15 PM");
    assert_eq!(cell_text(out, "C12"), "4:00 PM");
    assert_eq!(cell_text(out, "D12"), "Remote IT Support");
    assert_eq!(cell_text(out, "A13"), "");
    assert_eq!(cell_text(out, "A20"), "");

    match &report.pdf {
        Some(pdf) => assert!(pdf.exists()),
        None => assert!(matches!(report.warnings.as_slice(), [Warning::Export(_)])),
    }
}

#[tokio::test]
async fn test_invoice_number_increments_on_every_render() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    write_template(&svc.config.template, Some("Ana Ruiz"), Some(10.0));
    std::fs::write(
        &svc.config.entry_file,
        r#"{"entries":[{"date":"4/20/2025","hours":8,"project":"P","type":"R"}]}"#,
    )
    .unwrap();

    let first = render(&svc).await.unwrap();
    let second = render(&svc).await.unwrap();

    assert_eq!(first.invoice_number, 11);
    assert_eq!(second.invoice_number, 12);
    assert_eq!(second.period_label, "4 - 16 al 30 - 2025");
    assert_eq!(cell_text(&svc.config.template, "E4"), "12");
}

#[tokio::test]
async fn test_unattended_run_without_name_fails() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    write_template(&svc.config.template, None, None);
    std::fs::write(
        &svc.config.entry_file,
        r#"{"entries":[{"date":"11/2/2025","hours":8,"project":"P","type":"R"}]}"#,
    )
    .unwrap();

    let err = render(&svc).await.unwrap_err();
    assert!(matches!(err, InvoiceError::MissingConsultantName));
    assert_eq!(cell_text(&svc.config.template, "E4"), "");
}

#[tokio::test]
async fn test_empty_fetch_leaves_previous_entry_file() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    std::fs::write(&svc.config.entry_file, r#"{"entries":[]}"#).unwrap();

    let page = FakePage::healthy(&[["11/3/2025", "Acme", "Remote", "0"]]);
    let fetched = svc.fetch_with(page, &creds()).await.unwrap();
    assert!(fetched.is_empty());

    write_template(&svc.config.template, Some("Ana Ruiz"), None);
    let mut workbook = PortableWorkbook::open(&svc.config.template, dir.path()).unwrap();
    let err = svc.invoice_with(&mut workbook, &mut NoPrompt).await.unwrap_err();
    assert!(matches!(err, InvoiceError::EmptyInput));
}

#[tokio::test]
async fn test_missing_entry_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    write_template(&svc.config.template, Some("Ana Ruiz"), None);

    let err = render(&svc).await.unwrap_err();
    assert!(matches!(err, InvoiceError::EntryFileMissing { .. }));
}

fn invoice_artifacts(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(" INV ("))
        .collect()
}

#[tokio::test]
async fn test_run_renders_after_successful_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let mut svc = service(dir.path());
    svc.config.full_name_override = Some("Juan Perez".to_string());
    write_template(&svc.config.template, None, Some(4.0));

    let page = FakePage::healthy(&[["11/3/2025", "Acme Corp", "Remote", "8.0"]]);
    let report = svc.run_with(page, &creds(), &mut NoPrompt).await.unwrap();

    assert_eq!(report.invoice_number, 5);
    assert_eq!(report.rows_written, 2);
    assert_eq!(cell_text(&svc.config.template, "E4"), "5");
}

#[tokio::test]
async fn test_run_with_empty_timecard_stops_before_invoice() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    write_template(&svc.config.template, Some("Ana Ruiz"), Some(4.0));
    let previous = r#"{"entries":[{"date":"10/20/2025","hours":8,"project":"P","type":"R"}]}"#;
    std::fs::write(&svc.config.entry_file, previous).unwrap();

    let page = FakePage::healthy(&[["11/3/2025", "Acme", "Remote", "0"]]);
    let err = svc.run_with(page, &creds(), &mut NoPrompt).await.unwrap_err();

    assert!(matches!(err, InvoiceError::EmptyInput));
    // last week's file is neither overwritten nor invoiced
    assert_eq!(std::fs::read_to_string(&svc.config.entry_file).unwrap(), previous);
    assert_eq!(cell_text(&svc.config.template, "E4"), "4");
    assert!(invoice_artifacts(dir.path()).is_empty());
}

#[tokio::test]
async fn test_run_with_failed_login_stops_before_invoice() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    write_template(&svc.config.template, Some("Ana Ruiz"), Some(4.0));

    let page = FakePage::healthy(&[["11/3/2025", "Acme", "Remote", "8"]]).with_login_error();
    let log = page.log();
    let err = svc.run_with(page, &creds(), &mut NoPrompt).await.unwrap_err();

    assert!(matches!(err, InvoiceError::Authentication));
    assert!(log.lock().unwrap().closed);
    assert!(!svc.config.entry_file.exists());
    assert_eq!(cell_text(&svc.config.template, "E4"), "4");
    assert!(invoice_artifacts(dir.path()).is_empty());
}
