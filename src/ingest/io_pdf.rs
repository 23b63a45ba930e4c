// Page sources backed by external programs: pdftotext for the text layer,
// pdftoppm and tesseract for OCR.

use crate::ingest::io_common::*;
use crate::ingest::*;

use booth_tally::extract::SourceError;
use regex::Regex;
use std::process::Command;
use std::time::{Duration, Instant};

pub struct PdfSource {
    path: PathBuf,
    call_timeout: Duration,
    deadline: Instant,
    language: String,
    ignore_text_layer: bool,
}

impl PdfSource {
    /// The document budget starts when the source is created.
    pub fn new(path: &Path, rules: &OcrRules, ignore_text_layer: bool) -> PdfSource {
        PdfSource {
            path: path.to_path_buf(),
            call_timeout: rules.call_timeout,
            deadline: Instant::now() + rules.document_budget,
            language: rules.language.clone(),
            ignore_text_layer,
        }
    }

    fn timeout(&self) -> Result<Duration, SourceError> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(SourceError::Timeout(format!(
                "document budget spent on {}",
                self.path.display()
            )));
        }
        Ok(left.min(self.call_timeout))
    }
}

fn scratch_dir() -> Result<tempfile::TempDir, SourceError> {
    tempfile::tempdir().map_err(|e| SourceError::Failed(format!("temporary directory: {}", e)))
}

fn read_text(p: &Path) -> Result<String, SourceError> {
    fs::read(p)
        .map(|b| String::from_utf8_lossy(&b).to_string())
        .map_err(|e| SourceError::Failed(format!("reading {}: {}", p.display(), e)))
}

// The page images written by pdftoppm, in page order.
fn page_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let pattern = Regex::new(r"^page-(\d+)\.png$")
        .map_err(|e| SourceError::Failed(format!("page pattern: {}", e)))?;
    let entries =
        fs::read_dir(dir).map_err(|e| SourceError::Failed(format!("page images: {}", e)))?;
    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let name = simplify_file_name(&path);
        if let Some(c) = pattern.captures(&name) {
            if let Ok(n) = c[1].parse::<u32>() {
                pages.push((n, path));
            }
        }
    }
    pages.sort();
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

impl PageSource for PdfSource {
    fn text_layer(&self) -> Result<Option<Vec<String>>, SourceError> {
        if self.ignore_text_layer {
            return Ok(None);
        }
        let dir = scratch_dir()?;
        let out = dir.path().join("layer.txt");
        run_with_timeout(
            Command::new("pdftotext")
                .arg("-layout")
                .arg(&self.path)
                .arg(&out),
            self.timeout()?,
        )?;
        let pages = split_pages(&read_text(&out)?);
        if pages.iter().all(|p| p.trim().is_empty()) {
            debug!("text_layer: {}: no text layer", self.path.display());
            return Ok(None);
        }
        Ok(Some(pages))
    }

    fn ocr_pages(&self, dpi: u32) -> Result<Vec<String>, SourceError> {
        let dir = scratch_dir()?;
        run_with_timeout(
            Command::new("pdftoppm")
                .arg("-r")
                .arg(dpi.to_string())
                .arg("-gray")
                .arg("-png")
                .arg(&self.path)
                .arg(dir.path().join("page")),
            self.timeout()?,
        )?;
        let images = page_images(dir.path())?;
        if images.is_empty() {
            return Err(SourceError::Failed(format!(
                "pdftoppm produced no page for {}",
                self.path.display()
            )));
        }
        let mut pages: Vec<String> = Vec::new();
        for (idx, img) in images.iter().enumerate() {
            let base = dir.path().join(format!("ocr-{}", idx + 1));
            run_with_timeout(
                Command::new("tesseract")
                    .arg(img)
                    .arg(&base)
                    .arg("-l")
                    .arg(&self.language)
                    .arg("--psm")
                    .arg("6"),
                self.timeout()?,
            )?;
            pages.push(read_text(&base.with_extension("txt"))?);
        }
        debug!(
            "ocr_pages: {} at {} dpi: {} pages",
            self.path.display(),
            dpi,
            pages.len()
        );
        Ok(pages)
    }

    fn budget_exhausted(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// A document that is already plain text, pages separated by form feeds.
pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    pub fn new(path: &Path) -> TextFileSource {
        TextFileSource {
            path: path.to_path_buf(),
        }
    }
}

impl PageSource for TextFileSource {
    fn text_layer(&self) -> Result<Option<Vec<String>>, SourceError> {
        let pages = split_pages(&read_text(&self.path)?);
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Ok(None);
        }
        Ok(Some(pages))
    }

    fn ocr_pages(&self, _dpi: u32) -> Result<Vec<String>, SourceError> {
        Err(SourceError::Unavailable(format!(
            "{} is plain text",
            self.path.display()
        )))
    }
}

/// The hex SHA-256 of a document, recorded with its results.
pub fn document_digest(path: &Path) -> IngestResult<String> {
    let bytes = fs::read(path).context(OpeningDocumentSnafu {
        path: path.display().to_string(),
    })?;
    Ok(sha256::digest(bytes.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_file_pages() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("doc.txt");
        fs::write(&p, "1 10 20\x0c2 30 40\x0c").unwrap();
        let s = TextFileSource::new(&p);
        assert_eq!(
            s.text_layer().unwrap(),
            Some(vec!["1 10 20".to_string(), "2 30 40".to_string()])
        );
        assert!(matches!(s.ocr_pages(300), Err(SourceError::Unavailable(_))));

        fs::write(&p, "  \n\x0c\n").unwrap();
        assert_eq!(s.text_layer().unwrap(), None);
    }

    #[test]
    fn missing_text_file_fails() {
        let s = TextFileSource::new(Path::new("/nonexistent/form20.txt"));
        assert!(matches!(s.text_layer(), Err(SourceError::Failed(_))));
    }

    #[test]
    fn page_images_in_page_order() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["page-10.png", "page-02.png", "page-1.png", "other.png"] {
            fs::write(dir.path().join(n), b"").unwrap();
        }
        let names: Vec<String> = page_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| simplify_file_name(p))
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-02.png", "page-10.png"]);
    }

    #[test]
    fn spent_budget() {
        let rules = OcrRules {
            plan: booth_tally::OcrPlan::DEFAULT,
            call_timeout: Duration::from_secs(5),
            document_budget: Duration::from_secs(0),
            language: "eng".to_string(),
        };
        let s = PdfSource::new(Path::new("x.pdf"), &rules, true);
        assert!(s.budget_exhausted());
        assert_eq!(s.text_layer().unwrap(), None);
        assert!(matches!(s.ocr_pages(300), Err(SourceError::Timeout(_))));
    }

    #[test]
    fn digest() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("doc.txt");
        fs::write(&p, "abc").unwrap();
        assert_eq!(
            document_digest(&p).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(document_digest(&dir.path().join("missing")).is_err());
    }
}
