//! Attachment text extraction using pdftotext and Tesseract.
//!
//! Primary pass: layout-aware extraction with `pdftotext`. When that
//! yields nothing (scanned documents), each page is rasterized with
//! `pdftoppm` and run through `tesseract`. Neither path raises: failures
//! collapse into the typed sentinels of [`ExtractedText`], which
//! downstream treats as usable text so a comment keeps a readable trace
//! of why it has none.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::error::PdfError;
use crate::traits::AttachmentText;

/// Outcome of extracting text from an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedText {
    /// Text obtained from the primary pass or OCR.
    Text(String),
    /// OCR was attempted and the machinery itself failed.
    OcrFailed,
    /// Neither pass yielded any text.
    Unreadable,
}

impl ExtractedText {
    /// Collapse into a string for downstream prompt assembly. The
    /// sentinels are informative values, not errors.
    pub fn into_text(self) -> String {
        match self {
            ExtractedText::Text(text) => text,
            ExtractedText::OcrFailed => "Unknown (OCR failed)".to_string(),
            ExtractedText::Unreadable => "Unknown (PDF unreadable)".to_string(),
        }
    }

    /// Whether real text was extracted.
    pub fn is_text(&self) -> bool {
        matches!(self, ExtractedText::Text(_))
    }
}

/// PDF text extractor shelling out to poppler and Tesseract.
pub struct PdfExtractor {
    tesseract_lang: String,
    ocr_dpi: u32,
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self {
            tesseract_lang: "eng".to_string(),
            ocr_dpi: 300,
        }
    }
}

impl PdfExtractor {
    /// Create an extractor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the Tesseract language.
    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        self.tesseract_lang = lang.into();
        self
    }

    /// Extract text from a PDF, falling back to OCR when the primary pass
    /// yields nothing.
    pub fn extract_pdf(&self, path: &Path) -> ExtractedText {
        let primary = self.run_pdftotext(path).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "pdftotext failed");
            e
        });
        resolve_passes(primary, || {
            tracing::info!(path = %path.display(), "no embedded text, running OCR");
            self.ocr_pdf(path).map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "OCR failed");
                e
            })
        })
    }

    /// Layout-aware extraction of the whole document to stdout.
    fn run_pdftotext(&self, path: &Path) -> Result<String, PdfError> {
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .arg(path)
            .arg("-")
            .output();

        handle_output(output, "pdftotext (install poppler-utils)")
    }

    /// Rasterize every page and OCR each image in document order.
    fn ocr_pdf(&self, path: &Path) -> Result<String, PdfError> {
        let temp_dir = TempDir::new()?;
        let dpi = self.ocr_dpi.to_string();

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi])
            .arg(path)
            .arg(temp_dir.path().join("page"))
            .status();

        match status {
            Ok(s) if s.success() => {}
            Ok(_) => {
                return Err(PdfError::ToolFailed {
                    tool: "pdftoppm".to_string(),
                    message: "failed to rasterize PDF".to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PdfError::ToolNotFound(
                    "pdftoppm (install poppler-utils)".to_string(),
                ))
            }
            Err(e) => return Err(PdfError::Io(e)),
        }

        let mut images: Vec<PathBuf> = std::fs::read_dir(temp_dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "png").unwrap_or(false))
            .collect();
        images.sort();

        if images.is_empty() {
            return Err(PdfError::ToolFailed {
                tool: "pdftoppm".to_string(),
                message: "no page images produced".to_string(),
            });
        }

        let mut text = String::new();
        for image in &images {
            text.push_str(&self.run_tesseract(image)?);
            text.push('\n');
        }
        Ok(text)
    }

    /// Run Tesseract OCR on one page image.
    fn run_tesseract(&self, image: &Path) -> Result<String, PdfError> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.tesseract_lang])
            .output();

        handle_output(output, "tesseract (install tesseract-ocr)")
    }
}

impl AttachmentText for PdfExtractor {
    fn extract(&self, path: &Path) -> ExtractedText {
        self.extract_pdf(path)
    }
}

/// Combine the two passes. OCR runs only when the primary pass errored
/// or produced nothing but whitespace; a primary pass that yields text
/// returns it directly, so re-extracting a text PDF is a pure function
/// of the pdftotext output.
fn resolve_passes<F>(
    primary: Result<String, PdfError>,
    run_ocr: F,
) -> ExtractedText
where
    F: FnOnce() -> Result<String, PdfError>,
{
    if let Ok(text) = &primary {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            return ExtractedText::Text(trimmed.to_string());
        }
    }

    match run_ocr() {
        Ok(text) if !text.trim().is_empty() => ExtractedText::Text(text.trim().to_string()),
        Ok(_) => ExtractedText::Unreadable,
        Err(_) => ExtractedText::OcrFailed,
    }
}

fn handle_output(
    result: std::io::Result<std::process::Output>,
    tool: &str,
) -> Result<String, PdfError> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => Err(PdfError::ToolFailed {
            tool: tool.to_string(),
            message: String::from_utf8_lossy(&output.stderr).to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PdfError::ToolNotFound(tool.to_string()))
        }
        Err(e) => Err(PdfError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_usable_strings() {
        assert_eq!(ExtractedText::OcrFailed.into_text(), "Unknown (OCR failed)");
        assert_eq!(
            ExtractedText::Unreadable.into_text(),
            "Unknown (PDF unreadable)"
        );
        assert!(!ExtractedText::OcrFailed.is_text());
    }

    #[test]
    fn test_text_passes_through() {
        let extracted = ExtractedText::Text("Dear Administrator,".to_string());
        assert!(extracted.is_text());
        assert_eq!(extracted.into_text(), "Dear Administrator,");
    }

    #[test]
    fn test_embedded_text_skips_ocr() {
        let mut ocr_ran = false;
        let result = resolve_passes(Ok("Dear Administrator,\n".to_string()), || {
            ocr_ran = true;
            Ok(String::new())
        });

        assert!(!ocr_ran);
        assert_eq!(result, ExtractedText::Text("Dear Administrator,".to_string()));
    }

    #[test]
    fn test_text_extraction_is_idempotent() {
        // Same embedded text in, same extraction out, with OCR untouched
        // both times.
        let extract = || {
            resolve_passes(Ok("  Page one text  ".to_string()), || {
                panic!("OCR must not run for a text PDF")
            })
        };
        assert_eq!(extract(), extract());
        assert_eq!(extract(), ExtractedText::Text("Page one text".to_string()));
    }

    #[test]
    fn test_primary_error_falls_back_to_ocr() {
        let result = resolve_passes(
            Err(PdfError::ToolNotFound("pdftotext".to_string())),
            || Ok("Scanned page text".to_string()),
        );
        assert_eq!(result, ExtractedText::Text("Scanned page text".to_string()));
    }

    #[test]
    fn test_whitespace_primary_triggers_ocr() {
        let mut ocr_ran = false;
        let result = resolve_passes(Ok("   \n\n".to_string()), || {
            ocr_ran = true;
            Ok(String::new())
        });
        assert!(ocr_ran);
        assert_eq!(result, ExtractedText::Unreadable);
    }

    #[test]
    fn test_ocr_machinery_failure_is_the_ocr_sentinel() {
        let result = resolve_passes(Ok(String::new()), || {
            Err(PdfError::ToolFailed {
                tool: "tesseract".to_string(),
                message: "boom".to_string(),
            })
        });
        assert_eq!(result, ExtractedText::OcrFailed);
    }
}
