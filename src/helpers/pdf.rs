use lopdf::Document;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::ExportFailure;

const OFFICE_BINARIES: [&str; 2] = ["soffice", "libreoffice"];

fn load_pdf<P: AsRef<Path>>(path: P) -> Result<Document, lopdf::Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Document::load_from(reader)
}

/// Confirms an exported file is a readable PDF and returns its page count.
pub fn verify_pdf(path: &Path) -> Result<usize, ExportFailure> {
    match load_pdf(path) {
        Ok(doc) => {
            let pages = doc.get_pages().len();
            if pages == 0 {
                return Err(ExportFailure::InvalidPdf {
                    path: path.to_path_buf(),
                    reason: "document has no pages".to_string(),
                });
            }
            Ok(pages)
        }
        Err(e) => {
            error!("Failed to load PDF {}: {}", path.display(), e);
            Err(ExportFailure::InvalidPdf {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }
}

/// Converts a saved spreadsheet with a headless LibreOffice and moves the
/// result to `desired`. Best effort: every failure is an [`ExportFailure`].
pub async fn convert_with_office(xlsx: &Path, desired: &Path) -> Result<PathBuf, ExportFailure> {
    convert_with(&OFFICE_BINARIES, xlsx, desired).await
}

async fn convert_with(
    candidates: &[&str],
    xlsx: &Path,
    desired: &Path,
) -> Result<PathBuf, ExportFailure> {
    let out_dir = xlsx
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    info!("Attempting automatic PDF export via LibreOffice...");

    for binary in candidates {
        let result = Command::new(binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(xlsx)
            .output()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                error!("Could not run {}: {}", binary, e);
                return Err(ExportFailure::ToolFailed {
                    status: None,
                    output: e.to_string(),
                });
            }
        };

        if !output.status.success() {
            let combined = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            warn!("{} exited with {}", binary, output.status);
            return Err(ExportFailure::ToolFailed {
                status: output.status.code(),
                output: combined.trim().to_string(),
            });
        }

        // LibreOffice names the result after the input file.
        let generated = match xlsx.file_stem() {
            // Stems carry dots ("J. Perez"), so no `with_extension` here.
            Some(stem) => out_dir.join(format!("{}.pdf", stem.to_string_lossy())),
            None => return Err(ExportFailure::OutputMissing { expected: desired.to_path_buf() }),
        };
        if !generated.exists() {
            return Err(ExportFailure::OutputMissing { expected: generated });
        }
        if generated != desired {
            std::fs::rename(&generated, desired).map_err(|e| ExportFailure::ToolFailed {
                status: None,
                output: format!("moving {}: {}", generated.display(), e),
            })?;
        }
        return Ok(desired.to_path_buf());
    }

    warn!("LibreOffice was not found on PATH");
    Err(ExportFailure::ToolNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_office_binary_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("invoice.xlsx");
        std::fs::write(&xlsx, b"not really a workbook").unwrap();

        let result = convert_with(
            &["definitely-not-an-office-suite-binary"],
            &xlsx,
            &dir.path().join("invoice.pdf"),
        )
        .await;
        assert_eq!(result, Err(ExportFailure::ToolNotFound));
    }

    #[test]
    fn test_verify_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-garbage").unwrap();
        assert!(matches!(verify_pdf(&path), Err(ExportFailure::InvalidPdf { .. })));
    }

    #[test]
    fn test_verify_counts_pages() {
        use lopdf::{Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.pdf");
        doc.save(&path).unwrap();

        assert_eq!(verify_pdf(&path), Ok(1));
    }
}
