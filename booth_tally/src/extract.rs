//! The bounded sequence of extraction attempts for one document.

use std::error::Error;
use std::fmt::Display;

use log::{debug, info, warn};

use crate::config::*;
use crate::rows::{consistent_row_share, detect_rows};

/// One way of getting the text of a document.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Attempt {
    /// The embedded text layer of the document.
    TextLayer,
    /// Pages rendered at the given resolution and passed through OCR.
    Ocr { dpi: u32 },
}

impl Attempt {
    pub fn is_ocr(&self) -> bool {
        matches!(self, Attempt::Ocr { .. })
    }
}

/// The finite list of attempts, tried in order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AttemptPlan {
    pub attempts: Vec<Attempt>,
}

impl AttemptPlan {
    /// Text layer first, then OCR at increasing resolutions.
    pub fn with_ocr_fallback(ocr: &OcrPlan) -> AttemptPlan {
        let mut attempts = vec![Attempt::TextLayer];
        attempts.extend(AttemptPlan::ocr_only(ocr).attempts);
        AttemptPlan { attempts }
    }

    /// Only OCR, for documents known to be scans.
    pub fn ocr_only(ocr: &OcrPlan) -> AttemptPlan {
        let attempts = (0..=ocr.max_retries)
            .map(|i| Attempt::Ocr {
                dpi: ocr.initial_dpi + i * ocr.dpi_step,
            })
            .collect();
        AttemptPlan { attempts }
    }

    pub fn text_only() -> AttemptPlan {
        AttemptPlan {
            attempts: vec![Attempt::TextLayer],
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SourceError {
    /// The source cannot serve this kind of attempt (missing tool, no OCR for
    /// a plain text source).
    Unavailable(String),
    Timeout(String),
    Failed(String),
}

impl Error for SourceError {}

impl Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Unavailable(s) => write!(f, "unavailable: {}", s),
            SourceError::Timeout(s) => write!(f, "timed out: {}", s),
            SourceError::Failed(s) => write!(f, "failed: {}", s),
        }
    }
}

/// Something that can produce the pages of text of one document.
///
/// Implementations call external programs and must enforce their own
/// timeouts: a call that takes too long returns `SourceError::Timeout`.
pub trait PageSource {
    /// The text layer, one string per page. `None` if the document has no
    /// usable text layer (a scan).
    fn text_layer(&self) -> Result<Option<Vec<String>>, SourceError>;

    /// The OCR output at the given resolution, one string per page.
    fn ocr_pages(&self, dpi: u32) -> Result<Vec<String>, SourceError>;

    /// True once the wall-time budget of the document is spent. No further
    /// attempt is started after that.
    fn budget_exhausted(&self) -> bool {
        false
    }
}

/// The tagged outcome of a single attempt.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AttemptOutcome {
    Success(RawMatrix),
    LowConfidence(RawMatrix),
    Failure(String),
}

/// What happened while extracting one document.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExtractionReport {
    /// The retained matrix, empty if every attempt failed.
    pub matrix: RawMatrix,
    pub attempts: Vec<(Attempt, AttemptOutcome)>,
    /// The attempt whose matrix was retained.
    pub used: Option<Attempt>,
    pub low_confidence: bool,
}

impl ExtractionReport {
    /// The issues describing the extraction.
    pub fn issues(&self) -> Vec<Issue> {
        let mut res = Vec::new();
        if let Some(a) = self.used {
            if let Attempt::Ocr { dpi } = a {
                res.push(Issue::new(
                    IssueCode::OcrFallback,
                    format!("rows obtained by OCR at {} dpi", dpi),
                ));
            }
            if self.low_confidence {
                res.push(Issue::new(
                    IssueCode::LowConfidenceExtraction,
                    format!(
                        "inconsistent row widths ({:.0}% of rows share the modal width)",
                        100.0 * consistent_row_share(&self.matrix)
                    ),
                ));
            }
        } else {
            let reasons: Vec<String> = self
                .attempts
                .iter()
                .filter_map(|(a, o)| match o {
                    AttemptOutcome::Failure(r) => Some(format!("{:?}: {}", a, r)),
                    _ => None,
                })
                .collect();
            let detail = if reasons.is_empty() {
                "no attempt was made".to_string()
            } else {
                reasons.join("; ")
            };
            res.push(Issue::new(IssueCode::ExtractionFailure, detail));
        }
        res
    }
}

fn classify(pages: &[String], thresholds: &Thresholds) -> AttemptOutcome {
    let matrix = detect_rows(pages, thresholds);
    if matrix.is_empty() {
        return AttemptOutcome::Failure("no booth row detected".to_string());
    }
    if consistent_row_share(&matrix) < thresholds.min_consistent_rows {
        AttemptOutcome::LowConfidence(matrix)
    } else {
        AttemptOutcome::Success(matrix)
    }
}

fn run_attempt(source: &dyn PageSource, attempt: Attempt, thresholds: &Thresholds) -> AttemptOutcome {
    let pages = match attempt {
        Attempt::TextLayer => match source.text_layer() {
            Ok(Some(pages)) => pages,
            Ok(None) => return AttemptOutcome::Failure("no text layer".to_string()),
            Err(e) => return AttemptOutcome::Failure(e.to_string()),
        },
        Attempt::Ocr { dpi } => match source.ocr_pages(dpi) {
            Ok(pages) => pages,
            Err(e) => return AttemptOutcome::Failure(e.to_string()),
        },
    };
    classify(&pages, thresholds)
}

/// Runs the attempts in order and stops at the first success.
///
/// If no attempt succeeds, the low-confidence result with the most rows is
/// retained (the earliest one on ties). If there is none, the matrix is empty.
pub fn extract(
    source: &dyn PageSource,
    plan: &AttemptPlan,
    thresholds: &Thresholds,
) -> ExtractionReport {
    let mut attempts: Vec<(Attempt, AttemptOutcome)> = Vec::new();
    let mut best: Option<(Attempt, RawMatrix)> = None;

    for attempt in plan.attempts.iter() {
        if source.budget_exhausted() {
            warn!("extract: document budget exhausted before {:?}", attempt);
            attempts.push((
                *attempt,
                AttemptOutcome::Failure("document time budget exhausted".to_string()),
            ));
            break;
        }
        let outcome = run_attempt(source, *attempt, thresholds);
        debug!("extract: {:?} -> {:?}", attempt, outcome_tag(&outcome));
        match &outcome {
            AttemptOutcome::Success(m) => {
                info!("extract: {:?} found {} rows", attempt, m.rows.len());
                let matrix = m.clone();
                attempts.push((*attempt, outcome));
                return ExtractionReport {
                    matrix,
                    attempts,
                    used: Some(*attempt),
                    low_confidence: false,
                };
            }
            AttemptOutcome::LowConfidence(m) => {
                let better = match &best {
                    Some((_, b)) => m.rows.len() > b.rows.len(),
                    None => true,
                };
                if better {
                    best = Some((*attempt, m.clone()));
                }
            }
            AttemptOutcome::Failure(reason) => {
                debug!("extract: {:?} failed: {}", attempt, reason);
            }
        }
        attempts.push((*attempt, outcome));
    }

    match best {
        Some((attempt, matrix)) => {
            warn!(
                "extract: keeping low confidence result of {:?} ({} rows)",
                attempt,
                matrix.rows.len()
            );
            ExtractionReport {
                matrix,
                attempts,
                used: Some(attempt),
                low_confidence: true,
            }
        }
        None => {
            warn!("extract: all {} attempts failed", attempts.len());
            ExtractionReport {
                matrix: RawMatrix::default(),
                attempts,
                used: None,
                low_confidence: false,
            }
        }
    }
}

fn outcome_tag(o: &AttemptOutcome) -> &'static str {
    match o {
        AttemptOutcome::Success(_) => "success",
        AttemptOutcome::LowConfidence(_) => "low confidence",
        AttemptOutcome::Failure(_) => "failure",
    }
}

/// A source made of text that is already in memory.
///
/// It has a text layer and no OCR. Used for pre-extracted documents.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InMemorySource {
    pub pages: Vec<String>,
}

impl InMemorySource {
    /// Splits the text into pages on form feeds.
    pub fn from_text(text: &str) -> InMemorySource {
        InMemorySource {
            pages: text.split('\x0c').map(|p| p.to_string()).collect(),
        }
    }
}

impl PageSource for InMemorySource {
    fn text_layer(&self) -> Result<Option<Vec<String>>, SourceError> {
        if self.pages.iter().all(|p| p.trim().is_empty()) {
            return Ok(None);
        }
        Ok(Some(self.pages.clone()))
    }

    fn ocr_pages(&self, _dpi: u32) -> Result<Vec<String>, SourceError> {
        Err(SourceError::Unavailable(
            "no OCR for in-memory text".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct ScannedSource {
        // Text returned for each dpi.
        by_dpi: Vec<(u32, String)>,
        calls: RefCell<Vec<u32>>,
    }

    impl PageSource for ScannedSource {
        fn text_layer(&self) -> Result<Option<Vec<String>>, SourceError> {
            Ok(None)
        }

        fn ocr_pages(&self, dpi: u32) -> Result<Vec<String>, SourceError> {
            self.calls.borrow_mut().push(dpi);
            match self.by_dpi.iter().find(|(d, _)| *d == dpi) {
                Some((_, t)) => Ok(vec![t.clone()]),
                None => Err(SourceError::Timeout(format!("page 1 at {} dpi", dpi))),
            }
        }
    }

    #[test]
    fn plan_is_bounded() {
        let plan = AttemptPlan::with_ocr_fallback(&OcrPlan::DEFAULT);
        assert_eq!(
            plan.attempts,
            vec![
                Attempt::TextLayer,
                Attempt::Ocr { dpi: 200 },
                Attempt::Ocr { dpi: 300 }
            ]
        );
    }

    #[test]
    fn text_layer_success_stops() {
        let src = InMemorySource::from_text("1 10 20 30 60\n2 11 21 31 63\n");
        let plan = AttemptPlan::with_ocr_fallback(&OcrPlan::DEFAULT);
        let r = extract(&src, &plan, &Thresholds::DEFAULT);
        assert_eq!(r.used, Some(Attempt::TextLayer));
        assert_eq!(r.attempts.len(), 1);
        assert_eq!(r.matrix.rows.len(), 2);
        assert!(r.issues().is_empty());
    }

    #[test]
    fn ocr_retry_at_higher_resolution() {
        let src = ScannedSource {
            by_dpi: vec![(300, "1 10 20 30 60\n".to_string())],
            calls: RefCell::new(Vec::new()),
        };
        let plan = AttemptPlan::with_ocr_fallback(&OcrPlan::DEFAULT);
        let r = extract(&src, &plan, &Thresholds::DEFAULT);
        assert_eq!(*src.calls.borrow(), vec![200, 300]);
        assert_eq!(r.used, Some(Attempt::Ocr { dpi: 300 }));
        let codes: Vec<IssueCode> = r.issues().iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::OcrFallback]);
    }

    #[test]
    fn all_attempts_fail() {
        let src = ScannedSource {
            by_dpi: vec![],
            calls: RefCell::new(Vec::new()),
        };
        let plan = AttemptPlan::with_ocr_fallback(&OcrPlan::DEFAULT);
        let r = extract(&src, &plan, &Thresholds::DEFAULT);
        assert!(r.matrix.is_empty());
        assert_eq!(r.used, None);
        assert_eq!(r.attempts.len(), 3);
        assert_eq!(r.issues()[0].code, IssueCode::ExtractionFailure);
    }

    #[test]
    fn low_confidence_is_kept() {
        // Three rows, three different widths.
        let src = InMemorySource::from_text("1 10 20 30\n2 10 20 30 40\n3 1 2 3 4 5\n");
        let r = extract(&src, &AttemptPlan::text_only(), &Thresholds::DEFAULT);
        assert!(r.low_confidence);
        assert_eq!(r.matrix.rows.len(), 3);
        assert_eq!(r.issues()[0].code, IssueCode::LowConfidenceExtraction);
    }
}
