// ********* Output records ***********

use crate::ingest::*;

use booth_tally::extract::Attempt;
use booth_tally::reconcile::Adjustment;
use booth_tally::result::round4;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_EMPTY: i32 = 2;
pub const EXIT_NEEDS_REVIEW: i32 = 3;
pub const EXIT_POOR: i32 = 4;

pub const REPORT_FILE: &str = "validation_report.json";

/// All the constituencies of one state for one election year.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateYearOutput {
    pub state: String,
    pub year: u32,
    /// Keyed by canonical identifier, or by raw key for unmatched names.
    pub constituencies: BTreeMap<String, AcRecord>,
}

impl StateYearOutput {
    pub fn new(state: &str, year: u32) -> StateYearOutput {
        StateYearOutput {
            state: state.to_string(),
            year,
            constituencies: BTreeMap::new(),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcRecord {
    /// The key is a raw name that the schema could not resolve.
    #[serde(
        rename = "_unmatchedKey",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub unmatched_key: bool,
    pub raw_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_strategy: Option<String>,
    pub quality: String,
    pub metrics: MetricsRecord,
    pub result: ResultRecord,
    /// The order of the votes in the booth records.
    pub candidate_order: Vec<CandidateKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentRecord>,
    pub adjustments: Vec<AdjustmentRecord>,
    pub extraction: ExtractionRecord,
    pub issues: Vec<IssueRecord>,
    pub booths: BTreeMap<String, BoothRecord>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    pub booth_coverage: f64,
    pub vote_coverage: f64,
    pub max_candidate_error_pct: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub name: String,
    pub party: String,
    pub party_id: Option<String>,
    pub position: u32,
    pub votes: u64,
    pub vote_share: f64,
    pub deposit_lost: bool,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub candidates: Vec<CandidateRecord>,
    pub valid_votes: u64,
    pub nota_votes: Option<u64>,
    pub rejected_votes: Option<u64>,
    pub total_votes: u64,
    pub electors: Option<u64>,
    pub turnout: Option<f64>,
    pub winner: Option<String>,
    pub margin: u64,
    pub margin_pct: f64,
    pub enop: f64,
    pub votes_source: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateKey {
    pub name: String,
    pub party: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentRecord {
    pub format: String,
    pub offset: i32,
    pub confidence: f64,
    pub column_map: Vec<Option<usize>>,
    pub nota_column: Option<usize>,
    pub remapped: bool,
    pub flagged: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRecord {
    /// A candidate name, or NOTA.
    pub column: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub provider: String,
    pub file: String,
    pub sha256: Option<String>,
    /// The attempt whose rows were kept.
    pub attempt: Option<String>,
    pub attempts: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    pub code: String,
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booth: Option<String>,
    pub detail: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoothRecord {
    pub number: String,
    pub kind: String,
    pub raw_label: String,
    pub votes: Vec<u64>,
    pub valid_votes: u64,
    pub rejected_votes: u64,
    pub nota_votes: u64,
    pub total_votes: u64,
    pub page: Option<u32>,
    pub line: Option<u32>,
}

fn attempt_label(a: &Attempt) -> String {
    match a {
        Attempt::TextLayer => "textLayer".to_string(),
        Attempt::Ocr { dpi } => format!("ocr@{}", dpi),
    }
}

fn adjustment_record(column: &str, a: &Adjustment) -> AdjustmentRecord {
    let mut res = AdjustmentRecord {
        column: column.to_string(),
        kind: a.as_str().to_string(),
        from: None,
        to: None,
        extracted: None,
        official: None,
    };
    match a {
        Adjustment::Unchanged => {}
        Adjustment::Scaled { from, to } => {
            res.from = Some(*from);
            res.to = Some(*to);
        }
        Adjustment::GapFilled { to } => {
            res.to = Some(*to);
        }
        Adjustment::Escalated {
            extracted,
            official,
        } => {
            res.extracted = Some(*extracted);
            res.official = Some(*official);
        }
    }
    res
}

pub fn issue_record(i: &Issue) -> IssueRecord {
    IssueRecord {
        code: i.code.as_str().to_string(),
        severity: i.code.severity().as_str().to_string(),
        booth: i.booth.clone(),
        detail: i.detail.clone(),
    }
}

/// What is recorded about one processed constituency.
pub fn ac_record(
    outcome: &ConstituencyOutcome,
    reference: &Reference,
    raw_name: &str,
    extraction: ExtractionRecord,
) -> AcRecord {
    let r = &outcome.result;
    let result = ResultRecord {
        candidates: r
            .candidates
            .iter()
            .map(|c| CandidateRecord {
                name: c.name.clone(),
                party: c.party.clone(),
                party_id: c.party_id.clone(),
                position: c.position,
                votes: c.votes,
                vote_share: c.vote_share,
                deposit_lost: c.deposit_lost,
            })
            .collect(),
        valid_votes: r.valid_votes,
        nota_votes: r.nota_votes,
        rejected_votes: r.rejected_votes,
        total_votes: r.total_votes,
        electors: r.electors,
        turnout: r.turnout,
        winner: r.winner.clone(),
        margin: r.margin,
        margin_pct: r.margin_pct,
        enop: r.enop,
        votes_source: r.votes_source.as_str().to_string(),
    };

    let mut adjustments: Vec<AdjustmentRecord> = reference
        .candidates
        .iter()
        .zip(outcome.adjustments.iter())
        .map(|(c, a)| adjustment_record(&c.name, a))
        .collect();
    if let Some(a) = &outcome.nota_adjustment {
        adjustments.push(adjustment_record("NOTA", a));
    }

    let booths: BTreeMap<String, BoothRecord> = outcome
        .booths
        .iter()
        .map(|b| {
            let first = b.provenance.first();
            (
                b.id.clone(),
                BoothRecord {
                    number: b.number.clone(),
                    kind: b.kind.as_str().to_string(),
                    raw_label: b.raw_label.clone(),
                    votes: b.votes.clone(),
                    valid_votes: b.valid_votes,
                    rejected_votes: b.rejected_votes,
                    nota_votes: b.nota_votes,
                    total_votes: b.total_votes,
                    page: first.map(|p| p.page),
                    line: first.map(|p| p.line),
                },
            )
        })
        .collect();

    AcRecord {
        unmatched_key: outcome.is_unmatched(),
        raw_name: raw_name.to_string(),
        match_strategy: outcome
            .resolution
            .as_ref()
            .map(|r| r.strategy.as_str().to_string()),
        quality: outcome.tier.as_str().to_string(),
        metrics: MetricsRecord {
            booth_coverage: round4(outcome.metrics.booth_coverage),
            vote_coverage: round4(outcome.metrics.vote_coverage),
            max_candidate_error_pct: round4(outcome.metrics.max_candidate_error_pct),
        },
        result,
        candidate_order: reference
            .candidates
            .iter()
            .map(|c| CandidateKey {
                name: c.name.clone(),
                party: c.party.clone(),
            })
            .collect(),
        alignment: outcome.alignment.as_ref().map(|a| AlignmentRecord {
            format: a.format.as_str().to_string(),
            offset: a.offset,
            confidence: round4(a.confidence),
            column_map: a.column_map.clone(),
            nota_column: a.nota_column,
            remapped: a.remapped,
            flagged: a.flagged,
        }),
        adjustments,
        extraction: ExtractionRecord {
            attempt: outcome.extraction_used.as_ref().map(attempt_label),
            attempts: outcome.extraction_attempts,
            ..extraction
        },
        issues: outcome.issues.iter().map(issue_record).collect(),
        booths,
    }
}

// ******** Validation report *********

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedRecord {
    pub state: String,
    pub year: u32,
    pub ac: String,
    pub quality: String,
    pub codes: Vec<String>,
    pub issues: Vec<IssueRecord>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub processed: usize,
    pub tiers: BTreeMap<String, usize>,
    pub issue_counts: BTreeMap<String, usize>,
    /// The constituencies that are not usable or that have issues.
    pub flagged: Vec<FlaggedRecord>,
    pub exit_code: i32,
}

/// The exit code of a run. When several rules apply, the largest code wins.
pub fn exit_code(tiers: &[QualityTier], max_needs_review: usize) -> i32 {
    let count = |t: QualityTier| tiers.iter().filter(|x| **x == t).count();
    if count(QualityTier::Poor) > 0 {
        EXIT_POOR
    } else if count(QualityTier::NeedsReview) > max_needs_review {
        EXIT_NEEDS_REVIEW
    } else if count(QualityTier::Empty) > 0 {
        EXIT_EMPTY
    } else {
        EXIT_OK
    }
}

/// The report of the constituencies processed by a run.
///
/// `processed` holds (state, year, key, record).
pub fn validation_report(
    processed: &[(String, u32, String, &AcRecord)],
    exit_code: i32,
) -> ValidationReport {
    let mut tiers: BTreeMap<String, usize> = QualityTier::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();
    let mut issue_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut flagged: Vec<FlaggedRecord> = Vec::new();
    for (state, year, ac, rec) in processed.iter() {
        *tiers.entry(rec.quality.clone()).or_insert(0) += 1;
        for i in rec.issues.iter() {
            *issue_counts.entry(i.code.clone()).or_insert(0) += 1;
        }
        let usable = QualityTier::parse(&rec.quality).map_or(false, |t| t.is_usable());
        if !usable || !rec.issues.is_empty() {
            let mut codes: Vec<String> = rec.issues.iter().map(|i| i.code.clone()).collect();
            codes.sort();
            codes.dedup();
            flagged.push(FlaggedRecord {
                state: state.clone(),
                year: *year,
                ac: ac.clone(),
                quality: rec.quality.clone(),
                codes,
                issues: rec.issues.clone(),
            });
        }
    }
    flagged.sort_by(|a, b| (&a.state, a.year, &a.ac).cmp(&(&b.state, b.year, &b.ac)));
    ValidationReport {
        processed: processed.len(),
        tiers,
        issue_counts,
        flagged,
        exit_code,
    }
}

// ******** Files *********

fn output_file_pattern() -> IngestResult<Regex> {
    Regex::new(r"^(.+)_(\d{4})\.json$").whatever_context("invalid output file pattern")
}

pub fn output_file_name(state: &str, year: u32) -> String {
    let state: String = state
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}_{}.json", state, year)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> IngestResult<()> {
    let p = path.display().to_string();
    let mut js = serde_json::to_string_pretty(value).context(SerializingJsonSnafu { what: &p })?;
    js.push('\n');
    fs::write(path, js).context(WritingOutputSnafu { path: p })
}

/// Reads every state/year output of a directory. A missing directory has no
/// output.
pub fn read_outputs(dir: &Path) -> IngestResult<BTreeMap<(String, u32), StateYearOutput>> {
    let mut res: BTreeMap<(String, u32), StateYearOutput> = BTreeMap::new();
    if !dir.is_dir() {
        debug!("read_outputs: no directory {}", dir.display());
        return Ok(res);
    }
    let pattern = output_file_pattern()?;
    let dir_s = dir.display().to_string();
    let entries = fs::read_dir(dir).context(OpeningJsonSnafu { path: &dir_s })?;
    for entry in entries {
        let path = entry.context(OpeningJsonSnafu { path: &dir_s })?.path();
        let name = io_common::simplify_file_name(&path);
        if !pattern.is_match(&name) {
            continue;
        }
        let p = path.display().to_string();
        let contents = fs::read_to_string(&path).context(OpeningJsonSnafu { path: &p })?;
        let o: StateYearOutput =
            serde_json::from_str(&contents).context(ParsingJsonSnafu { path: &p })?;
        debug!(
            "read_outputs: {} ({} constituencies)",
            name,
            o.constituencies.len()
        );
        res.insert((o.state.clone(), o.year), o);
    }
    Ok(res)
}

/// Writes one state/year output. The whole file is rewritten.
pub fn write_output(dir: &Path, o: &StateYearOutput) -> IngestResult<PathBuf> {
    fs::create_dir_all(dir).context(WritingOutputSnafu {
        path: dir.display().to_string(),
    })?;
    let path = dir.join(output_file_name(&o.state, o.year));
    write_json(&path, o)?;
    info!("write_output: {}", path.display());
    Ok(path)
}

pub fn write_report(dir: &Path, report: &ValidationReport) -> IngestResult<PathBuf> {
    fs::create_dir_all(dir).context(WritingOutputSnafu {
        path: dir.display().to_string(),
    })?;
    let path = dir.join(REPORT_FILE);
    write_json(&path, report)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        use QualityTier::*;
        assert_eq!(exit_code(&[Excellent, Good, Partial], 0), EXIT_OK);
        assert_eq!(exit_code(&[], 0), EXIT_OK);
        assert_eq!(exit_code(&[Excellent, Empty], 0), EXIT_EMPTY);
        assert_eq!(exit_code(&[NeedsReview], 1), EXIT_OK);
        assert_eq!(exit_code(&[NeedsReview, NeedsReview], 1), EXIT_NEEDS_REVIEW);
        assert_eq!(exit_code(&[NeedsReview, Empty], 0), EXIT_NEEDS_REVIEW);
        assert_eq!(exit_code(&[Poor, Empty, NeedsReview], 0), EXIT_POOR);
    }

    #[test]
    fn file_names() {
        assert_eq!(output_file_name("TS", 2018), "TS_2018.json");
        assert_eq!(output_file_name("J/K", 2014), "J_K_2014.json");
        let p = output_file_pattern().unwrap();
        assert!(p.is_match("Andhra Pradesh_2009.json"));
        assert!(!p.is_match(REPORT_FILE));
    }

    fn record(quality: &str, codes: &[&str]) -> AcRecord {
        AcRecord {
            unmatched_key: false,
            raw_name: "x".to_string(),
            match_strategy: None,
            quality: quality.to_string(),
            metrics: MetricsRecord {
                booth_coverage: 1.0,
                vote_coverage: 1.0,
                max_candidate_error_pct: 0.0,
            },
            result: ResultRecord {
                candidates: vec![],
                valid_votes: 0,
                nota_votes: None,
                rejected_votes: None,
                total_votes: 0,
                electors: None,
                turnout: None,
                winner: None,
                margin: 0,
                margin_pct: 0.0,
                enop: 0.0,
                votes_source: "booths".to_string(),
            },
            candidate_order: vec![],
            alignment: None,
            adjustments: vec![],
            extraction: ExtractionRecord {
                provider: "text".to_string(),
                file: "x.txt".to_string(),
                sha256: None,
                attempt: None,
                attempts: 1,
            },
            issues: codes
                .iter()
                .map(|c| IssueRecord {
                    code: c.to_string(),
                    severity: "info".to_string(),
                    booth: None,
                    detail: String::new(),
                })
                .collect(),
            booths: BTreeMap::new(),
        }
    }

    #[test]
    fn report_lists_flagged_constituencies() {
        let good = record("GOOD", &[]);
        let scaled = record("PARTIAL", &["PROPORTIONALLY_SCALED", "PROPORTIONALLY_SCALED"]);
        let empty = record("EMPTY", &["EXTRACTION_FAILURE"]);
        let processed = vec![
            ("TS".to_string(), 2018, "TS-002".to_string(), &empty),
            ("TS".to_string(), 2018, "TS-001".to_string(), &good),
            ("AP".to_string(), 2019, "AP-010".to_string(), &scaled),
        ];
        let r = validation_report(&processed, EXIT_EMPTY);
        assert_eq!(r.processed, 3);
        assert_eq!(r.tiers["GOOD"], 1);
        assert_eq!(r.tiers["POOR"], 0);
        assert_eq!(r.issue_counts["PROPORTIONALLY_SCALED"], 2);
        let flagged: Vec<&str> = r.flagged.iter().map(|f| f.ac.as_str()).collect();
        assert_eq!(flagged, vec!["AP-010", "TS-002"]);
        assert_eq!(r.flagged[0].codes, vec!["PROPORTIONALLY_SCALED".to_string()]);
    }
}
