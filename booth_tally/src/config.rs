// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The location of a line in the source document.
///
/// Pages and lines are numbered from 1.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct Provenance {
    pub page: u32,
    pub line: u32,
}

/// One booth row, as detected in the text of a result document.
///
/// The numeric fields are kept in document order. They are not yet attributed
/// to candidates: this is the job of the aligner.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RawRow {
    pub raw_booth_label: String,
    pub numeric_fields: Vec<i64>,
    /// True if some non-numeric tokens (typically an address) were found
    /// after the booth label.
    pub has_text: bool,
    /// The first element is the line that opened the row, the others are
    /// the continuation lines merged into it.
    pub provenance: Vec<Provenance>,
}

/// All the booth rows of one document.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RawMatrix {
    pub rows: Vec<RawRow>,
}

impl RawMatrix {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The largest number of numeric fields over all the rows.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.numeric_fields.len())
            .max()
            .unwrap_or(0)
    }
}

/// A candidate of the authoritative list for one constituency and one year.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ReferenceCandidate {
    pub name: String,
    pub party: String,
    pub official_votes: u64,
}

/// The authoritative reference for one constituency and one year.
///
/// The candidates are in the official order, which is also the order of the
/// columns in well-formed documents.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Reference {
    pub candidates: Vec<ReferenceCandidate>,
    pub official_nota: Option<u64>,
    pub official_rejected: Option<u64>,
    pub expected_booths: Option<u32>,
    pub electors: Option<u64>,
}

impl Reference {
    /// The sum of the official candidate votes (NOTA excluded).
    pub fn official_valid(&self) -> u64 {
        self.candidates.iter().map(|c| c.official_votes).sum()
    }

    /// The share of the expected booths that were found, capped at 1.
    ///
    /// When the expected number of booths is unknown, any non-empty document
    /// is considered complete.
    pub fn booth_coverage(&self, num_booths: usize) -> f64 {
        if num_booths == 0 {
            return 0.0;
        }
        match self.expected_booths {
            Some(expected) if expected > 0 => (num_booths as f64 / expected as f64).min(1.0),
            _ => 1.0,
        }
    }
}

// ******** Issues *********

/// All the issues that can be attached to a constituency.
///
/// None of them stops the batch: they degrade the quality tag of a single
/// constituency and are listed in the validation report.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum IssueCode {
    ExtractionFailure,
    AlignmentAmbiguous,
    UnresolvedName,
    ReconciliationOverTolerance,
    InvalidVoteValue,
    CandidateRemapped,
    ColumnGapFilled,
    ProportionallyScaled,
    LowConfidenceExtraction,
    OcrFallback,
    DuplicateBooth,
    WorkerCrashed,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::ExtractionFailure => "EXTRACTION_FAILURE",
            IssueCode::AlignmentAmbiguous => "ALIGNMENT_AMBIGUOUS",
            IssueCode::UnresolvedName => "UNRESOLVED_NAME",
            IssueCode::ReconciliationOverTolerance => "RECONCILIATION_OVER_TOLERANCE",
            IssueCode::InvalidVoteValue => "INVALID_VOTE_VALUE",
            IssueCode::CandidateRemapped => "CANDIDATE_REMAPPED",
            IssueCode::ColumnGapFilled => "COLUMN_GAP_FILLED",
            IssueCode::ProportionallyScaled => "PROPORTIONALLY_SCALED",
            IssueCode::LowConfidenceExtraction => "LOW_CONFIDENCE_EXTRACTION",
            IssueCode::OcrFallback => "OCR_FALLBACK",
            IssueCode::DuplicateBooth => "DUPLICATE_BOOTH",
            IssueCode::WorkerCrashed => "WORKER_CRASHED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            IssueCode::ExtractionFailure
            | IssueCode::AlignmentAmbiguous
            | IssueCode::ReconciliationOverTolerance
            | IssueCode::WorkerCrashed => Severity::Error,
            IssueCode::UnresolvedName
            | IssueCode::InvalidVoteValue
            | IssueCode::LowConfidenceExtraction
            | IssueCode::DuplicateBooth => Severity::Warning,
            IssueCode::CandidateRemapped
            | IssueCode::ColumnGapFilled
            | IssueCode::ProportionallyScaled
            | IssueCode::OcrFallback => Severity::Info,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Issue {
    pub code: IssueCode,
    /// The booth concerned, if the issue is local to a booth.
    pub booth: Option<String>,
    pub detail: String,
}

impl Issue {
    pub fn new(code: IssueCode, detail: impl Into<String>) -> Issue {
        Issue {
            code,
            booth: None,
            detail: detail.into(),
        }
    }

    pub fn for_booth(code: IssueCode, booth: &str, detail: impl Into<String>) -> Issue {
        Issue {
            code,
            booth: Some(booth.to_string()),
            detail: detail.into(),
        }
    }
}

// ******** Quality tiers *********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum QualityTier {
    Excellent,
    Good,
    Partial,
    Poor,
    NeedsReview,
    Empty,
}

impl QualityTier {
    pub const ALL: [QualityTier; 6] = [
        QualityTier::Excellent,
        QualityTier::Good,
        QualityTier::Partial,
        QualityTier::Poor,
        QualityTier::NeedsReview,
        QualityTier::Empty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "EXCELLENT",
            QualityTier::Good => "GOOD",
            QualityTier::Partial => "PARTIAL",
            QualityTier::Poor => "POOR",
            QualityTier::NeedsReview => "NEEDS_REVIEW",
            QualityTier::Empty => "EMPTY",
        }
    }

    pub fn parse(s: &str) -> Option<QualityTier> {
        QualityTier::ALL.iter().find(|t| t.as_str() == s).cloned()
    }

    /// The tiers for which booth data is trusted to add up exactly.
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            QualityTier::Excellent | QualityTier::Good | QualityTier::Partial
        )
    }
}

// ******** Errors *********

/// Errors when assembling an authoritative reference.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ReferenceError {
    EmptyCandidateName { position: usize },
    DuplicateCandidate { name: String, party: String },
    NoCandidates,
}

impl Error for ReferenceError {}

impl Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceError::EmptyCandidateName { position } => {
                write!(f, "candidate at position {} has an empty name", position)
            }
            ReferenceError::DuplicateCandidate { name, party } => {
                write!(f, "candidate {} ({}) is listed twice", name, party)
            }
            ReferenceError::NoCandidates => write!(f, "the reference has no candidate"),
        }
    }
}

// ********* Configuration **********

/// Coverage and error bounds of one quality tier.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct TierBand {
    /// Minimum booth coverage, between 0 and 1.
    pub min_coverage: f64,
    /// Maximum candidate error (exclusive), between 0 and 1.
    pub max_error: f64,
}

/// All the tunable bounds of the pipeline.
///
/// The defaults were tuned on Indian Form 20 documents. They are exposed so
/// that other corpora can be processed without code changes.
#[derive(PartialEq, Debug, Clone)]
pub struct Thresholds {
    /// Columns of drift tried on each side by the aligner.
    pub max_offset: i32,
    /// Aggregate relative error at or above which an alignment is flagged.
    pub alignment_max_error: f64,
    /// Per-candidate relative error that triggers a remap attempt.
    pub candidate_tolerance: f64,
    pub fuzzy_min_similarity: f64,
    pub fuzzy_min_length: usize,
    /// Ratio of extracted to official votes where proportional scaling applies
    /// to a partially covered document.
    pub scaling_band: (f64, f64),
    /// Relative error that is always corrected, whatever the coverage.
    pub minor_tolerance: f64,
    /// Minimum booth coverage to fill a dropped column.
    pub gap_fill_min_coverage: f64,
    /// Values above this in a single booth are considered misreads.
    pub max_booth_votes: i64,
    /// Rows with fewer numeric fields are dropped by the row detector.
    pub min_numeric_fields: usize,
    /// Below this share of rows with the modal width, an extraction is of low
    /// confidence.
    pub min_consistent_rows: f64,
    pub excellent: TierBand,
    pub good: TierBand,
    pub partial: TierBand,
}

impl Thresholds {
    pub const DEFAULT: Thresholds = Thresholds {
        max_offset: 3,
        alignment_max_error: 0.20,
        candidate_tolerance: 0.05,
        fuzzy_min_similarity: 0.8,
        fuzzy_min_length: 5,
        scaling_band: (0.40, 0.95),
        minor_tolerance: 0.05,
        gap_fill_min_coverage: 0.95,
        max_booth_votes: 5000,
        min_numeric_fields: 3,
        min_consistent_rows: 0.5,
        excellent: TierBand {
            min_coverage: 0.95,
            max_error: 0.05,
        },
        good: TierBand {
            min_coverage: 0.80,
            max_error: 0.10,
        },
        partial: TierBand {
            min_coverage: 0.50,
            max_error: 0.20,
        },
    };

    /// A per-booth value that can be a real vote count.
    pub fn is_valid_vote(&self, v: i64) -> bool {
        v >= 0 && v <= self.max_booth_votes
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds::DEFAULT
    }
}

/// The OCR retry policy.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct OcrPlan {
    pub initial_dpi: u32,
    pub dpi_step: u32,
    /// Number of additional OCR passes after the first one.
    pub max_retries: u32,
}

impl OcrPlan {
    pub const DEFAULT: OcrPlan = OcrPlan {
        initial_dpi: 200,
        dpi_step: 100,
        max_retries: 1,
    };
}
