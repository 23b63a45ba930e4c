use crate::ingest::*;

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "maxNeedsReview")]
    pub max_needs_review: Option<usize>,
}

/// One document and its official results.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// A canonical identifier or a raw name.
    pub ac: String,
    pub state: String,
    pub year: u32,
    #[serde(rename = "referencePath")]
    pub reference_path: String,
    /// json, csv or xlsx. Guessed from the extension if not given.
    #[serde(rename = "referenceFormat")]
    pub reference_format: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    // These override the values of the reference file.
    #[serde(rename = "expectedBooths")]
    pub expected_booths: Option<u32>,
    pub electors: Option<u64>,
    #[serde(rename = "officialNota")]
    pub official_nota: Option<u64>,
    #[serde(rename = "officialRejected")]
    pub official_rejected: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Provider {
    Pdf,
    /// A PDF whose text layer is ignored.
    Ocr,
    Text,
}

impl DocumentSource {
    pub fn provider(&self) -> IngestResult<Provider> {
        match self.provider.as_str() {
            "pdf" => Ok(Provider::Pdf),
            "ocr" => Ok(Provider::Ocr),
            "text" => Ok(Provider::Text),
            x => whatever!("unknown provider {:?} for {}", x, self.file_path),
        }
    }

    pub fn reference_format(&self) -> IngestResult<ReferenceFormat> {
        let f = match &self.reference_format {
            Some(f) => f.to_lowercase(),
            None => Path::new(&self.reference_path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default(),
        };
        match f.as_str() {
            "json" => Ok(ReferenceFormat::Json),
            "csv" => Ok(ReferenceFormat::Csv),
            "xlsx" => Ok(ReferenceFormat::Xlsx),
            x => whatever!(
                "unknown reference format {:?} for {}",
                x,
                self.reference_path
            ),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ReferenceFormat {
    Json,
    Csv,
    Xlsx,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TierSettings {
    #[serde(rename = "minCoverage")]
    pub min_coverage: f64,
    #[serde(rename = "maxError")]
    pub max_error: f64,
}

/// Overrides of the default thresholds. All ratios are between 0 and 1.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdSettings {
    #[serde(rename = "maxOffset")]
    pub max_offset: Option<i32>,
    #[serde(rename = "alignmentMaxError")]
    pub alignment_max_error: Option<f64>,
    #[serde(rename = "candidateTolerance")]
    pub candidate_tolerance: Option<f64>,
    #[serde(rename = "fuzzyMinSimilarity")]
    pub fuzzy_min_similarity: Option<f64>,
    #[serde(rename = "fuzzyMinLength")]
    pub fuzzy_min_length: Option<usize>,
    #[serde(rename = "scalingBand")]
    pub scaling_band: Option<(f64, f64)>,
    #[serde(rename = "minorTolerance")]
    pub minor_tolerance: Option<f64>,
    #[serde(rename = "gapFillMinCoverage")]
    pub gap_fill_min_coverage: Option<f64>,
    #[serde(rename = "maxBoothVotes")]
    pub max_booth_votes: Option<i64>,
    #[serde(rename = "minNumericFields")]
    pub min_numeric_fields: Option<usize>,
    #[serde(rename = "minConsistentRows")]
    pub min_consistent_rows: Option<f64>,
    pub excellent: Option<TierSettings>,
    pub good: Option<TierSettings>,
    pub partial: Option<TierSettings>,
}

fn ratio(name: &str, x: Option<f64>, default: f64) -> IngestResult<f64> {
    match x {
        None => Ok(default),
        Some(v) if (0.0..=1.0).contains(&v) => Ok(v),
        Some(v) => whatever!("threshold {} must be between 0 and 1, got {}", name, v),
    }
}

fn band(name: &str, x: &Option<TierSettings>, default: TierBand) -> IngestResult<TierBand> {
    match x {
        None => Ok(default),
        Some(t) => Ok(TierBand {
            min_coverage: ratio(name, Some(t.min_coverage), default.min_coverage)?,
            max_error: ratio(name, Some(t.max_error), default.max_error)?,
        }),
    }
}

impl ThresholdSettings {
    pub fn to_thresholds(&self) -> IngestResult<Thresholds> {
        let d = Thresholds::DEFAULT;
        let scaling_band = match self.scaling_band {
            None => d.scaling_band,
            Some((lo, hi)) if 0.0 <= lo && lo < hi && hi <= 1.0 => (lo, hi),
            Some(x) => whatever!("scalingBand must be increasing within [0, 1], got {:?}", x),
        };
        let max_offset = match self.max_offset {
            None => d.max_offset,
            Some(x) if (0..=10).contains(&x) => x,
            Some(x) => whatever!("maxOffset must be between 0 and 10, got {}", x),
        };
        let max_booth_votes = match self.max_booth_votes {
            None => d.max_booth_votes,
            Some(x) if x > 0 => x,
            Some(x) => whatever!("maxBoothVotes must be positive, got {}", x),
        };
        Ok(Thresholds {
            max_offset,
            alignment_max_error: ratio(
                "alignmentMaxError",
                self.alignment_max_error,
                d.alignment_max_error,
            )?,
            candidate_tolerance: ratio(
                "candidateTolerance",
                self.candidate_tolerance,
                d.candidate_tolerance,
            )?,
            fuzzy_min_similarity: ratio(
                "fuzzyMinSimilarity",
                self.fuzzy_min_similarity,
                d.fuzzy_min_similarity,
            )?,
            fuzzy_min_length: self.fuzzy_min_length.unwrap_or(d.fuzzy_min_length),
            scaling_band,
            minor_tolerance: ratio("minorTolerance", self.minor_tolerance, d.minor_tolerance)?,
            gap_fill_min_coverage: ratio(
                "gapFillMinCoverage",
                self.gap_fill_min_coverage,
                d.gap_fill_min_coverage,
            )?,
            max_booth_votes,
            min_numeric_fields: self.min_numeric_fields.unwrap_or(d.min_numeric_fields),
            min_consistent_rows: ratio(
                "minConsistentRows",
                self.min_consistent_rows,
                d.min_consistent_rows,
            )?,
            excellent: band("excellent", &self.excellent, d.excellent)?,
            good: band("good", &self.good, d.good)?,
            partial: band("partial", &self.partial, d.partial)?,
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrSettings {
    #[serde(rename = "initialDpi")]
    pub initial_dpi: Option<u32>,
    #[serde(rename = "dpiStep")]
    pub dpi_step: Option<u32>,
    #[serde(rename = "maxRetries")]
    pub max_retries: Option<u32>,
    /// Timeout of each external program call.
    #[serde(rename = "callTimeoutSecs")]
    pub call_timeout_secs: Option<u64>,
    /// Wall-time budget of one document, all attempts included.
    #[serde(rename = "documentBudgetSecs")]
    pub document_budget_secs: Option<u64>,
    /// The tesseract language(s), e.g. "eng" or "eng+tel".
    pub language: Option<String>,
}

/// The OCR settings, validated.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OcrRules {
    pub plan: OcrPlan,
    pub call_timeout: Duration,
    pub document_budget: Duration,
    pub language: String,
}

impl OcrSettings {
    pub fn to_rules(&self) -> IngestResult<OcrRules> {
        let d = OcrPlan::DEFAULT;
        let plan = OcrPlan {
            initial_dpi: self.initial_dpi.unwrap_or(d.initial_dpi),
            dpi_step: self.dpi_step.unwrap_or(d.dpi_step),
            max_retries: self.max_retries.unwrap_or(d.max_retries),
        };
        if plan.initial_dpi < 50 || plan.initial_dpi > 1200 {
            whatever!("initialDpi must be between 50 and 1200, got {}", plan.initial_dpi)
        }
        if plan.max_retries > 5 {
            whatever!("maxRetries must be at most 5, got {}", plan.max_retries)
        }
        Ok(OcrRules {
            plan,
            call_timeout: Duration::from_secs(self.call_timeout_secs.unwrap_or(120)),
            document_budget: Duration::from_secs(self.document_budget_secs.unwrap_or(1800)),
            language: self.language.clone().unwrap_or_else(|| "eng".to_string()),
        })
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "schemaPath")]
    pub schema_path: String,
    #[serde(rename = "documentSources")]
    pub document_sources: Vec<DocumentSource>,
    pub thresholds: Option<ThresholdSettings>,
    pub ocr: Option<OcrSettings>,
    pub workers: Option<usize>,
}

pub fn read_config(path: &str) -> IngestResult<RunConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: RunConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    for s in config.document_sources.iter() {
        s.provider()?;
        s.reference_format()?;
    }
    Ok(config)
}
