/*!
Booth-level tallies from Form 20 election result documents.

The pipeline for one assembly constituency is:

1. extraction of the booth rows from the text of the document ([`extract`]),
2. alignment of the numeric columns onto the official candidate list ([`align`]),
3. resolution of the constituency and party names against the canonical
   schema ([`schema`]),
4. bounded corrections against the official totals ([`reconcile`]),
5. metrics and a quality tier ([`validate`]).

[`process_constituency`] runs all the steps. It never fails: every problem
is recorded as an [`Issue`] and degrades the quality tier of that
constituency only.

See the [`manual`] for the input and output formats.
*/

mod config;

pub mod align;
pub mod booth;
pub mod builder;
pub mod extract;
pub mod format;
pub mod manual;
pub mod matcher;
pub mod reconcile;
pub mod result;
pub mod rows;
pub mod schema;
pub mod validate;

use log::{info, warn};

pub use crate::config::*;

use crate::align::{align, Alignment};
use crate::extract::{extract, Attempt, AttemptPlan, PageSource};
use crate::reconcile::{reconcile, Adjustment};
use crate::result::{build_booths, from_booths, from_reference, Booth, ElectionResult};
use crate::schema::{Context, Resolution, SchemaIndex};
use crate::validate::{classify, metrics, Metrics, Signals};

/// One constituency to process, as described by the run configuration.
#[derive(Debug, Clone)]
pub struct ConstituencyInput<'a> {
    /// A canonical identifier or a free-text name.
    pub raw_ac: &'a str,
    /// A canonical identifier or a free-text name.
    pub raw_state: &'a str,
    pub year: u32,
    pub reference: &'a Reference,
}

/// Everything known about one constituency after processing.
#[derive(PartialEq, Debug, Clone)]
pub struct ConstituencyOutcome {
    /// The canonical identifier, or the raw key when the name could not be
    /// resolved.
    pub ac_key: String,
    /// `None` when `ac_key` is a raw key.
    pub resolution: Option<Resolution>,
    /// The canonical state identifier, or the raw state name.
    pub state_key: String,
    pub year: u32,
    pub result: ElectionResult,
    pub tier: QualityTier,
    pub metrics: Metrics,
    pub booths: Vec<Booth>,
    pub alignment: Option<Alignment>,
    /// In reference order.
    pub adjustments: Vec<Adjustment>,
    pub nota_adjustment: Option<Adjustment>,
    pub extraction_used: Option<Attempt>,
    pub extraction_attempts: usize,
    pub issues: Vec<Issue>,
}

impl ConstituencyOutcome {
    pub fn is_unmatched(&self) -> bool {
        self.resolution.is_none()
    }
}

/// The keys under which a constituency is stored.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ConstituencyKey {
    /// The canonical state identifier, or the raw state name.
    pub state_key: String,
    pub state_resolved: bool,
    /// The canonical identifier, or the raw key.
    pub ac_key: String,
    pub resolution: Option<Resolution>,
}

/// Resolves the state and the constituency names of an input.
pub fn constituency_key(
    raw_state: &str,
    raw_ac: &str,
    year: u32,
    index: &SchemaIndex,
) -> ConstituencyKey {
    let state = index.resolve(raw_state, &Context::state(Some(year)));
    let state_id = state.map(|r| r.id);
    let resolution = index.resolve(raw_ac, &Context::ac(state_id.as_deref(), Some(year)));
    ConstituencyKey {
        state_resolved: state_id.is_some(),
        state_key: state_id.unwrap_or_else(|| raw_state.trim().to_string()),
        ac_key: match &resolution {
            Some(r) => r.id.clone(),
            None => raw_ac.trim().to_string(),
        },
        resolution,
    }
}

struct Names {
    ac_key: String,
    resolution: Option<Resolution>,
    state_key: String,
    party_ids: Vec<Option<String>>,
    issues: Vec<Issue>,
}

fn resolve_names(input: &ConstituencyInput, index: &SchemaIndex) -> Names {
    let mut issues: Vec<Issue> = Vec::new();
    let year = Some(input.year);

    let key = constituency_key(input.raw_state, input.raw_ac, input.year, index);
    if !key.state_resolved {
        issues.push(Issue::new(
            IssueCode::UnresolvedName,
            format!("state {:?}", input.raw_state),
        ));
    }
    if key.resolution.is_none() {
        issues.push(Issue::new(
            IssueCode::UnresolvedName,
            format!("constituency {:?} kept under its raw key", input.raw_ac),
        ));
    }

    let party_ids: Vec<Option<String>> = input
        .reference
        .candidates
        .iter()
        .map(|c| {
            let r = index.resolve(&c.party, &Context::party(year));
            if r.is_none() {
                issues.push(Issue::new(
                    IssueCode::UnresolvedName,
                    format!("party {:?} of candidate {}", c.party, c.name),
                ));
            }
            r.map(|r| r.id)
        })
        .collect();

    Names {
        ac_key: key.ac_key,
        resolution: key.resolution,
        state_key: key.state_key,
        party_ids,
        issues,
    }
}

fn empty_outcome(
    input: &ConstituencyInput,
    names: Names,
    issues: Vec<Issue>,
    extraction_attempts: usize,
) -> ConstituencyOutcome {
    ConstituencyOutcome {
        ac_key: names.ac_key,
        resolution: names.resolution,
        state_key: names.state_key,
        year: input.year,
        result: from_reference(input.reference, &names.party_ids),
        tier: QualityTier::Empty,
        metrics: Metrics::EMPTY,
        booths: Vec::new(),
        alignment: None,
        adjustments: Vec::new(),
        nota_adjustment: None,
        extraction_used: None,
        extraction_attempts,
        issues,
    }
}

/// Runs the whole pipeline for one constituency.
pub fn process_constituency(
    input: &ConstituencyInput,
    source: &dyn PageSource,
    plan: &AttemptPlan,
    index: &SchemaIndex,
    thresholds: &Thresholds,
) -> ConstituencyOutcome {
    let names = resolve_names(input, index);
    let mut issues = names.issues.clone();

    let extraction = extract(source, plan, thresholds);
    issues.extend(extraction.issues());
    if extraction.matrix.is_empty() {
        warn!(
            "process_constituency: {} {}: no booth rows, EMPTY",
            names.ac_key, input.year
        );
        let attempts = extraction.attempts.len();
        return empty_outcome(input, names, issues, attempts);
    }

    let aligned = align(&extraction.matrix, input.reference, thresholds);
    issues.extend(aligned.issues());
    let booth_count = aligned.rows.len();
    let metrics = metrics(&aligned, input.reference, booth_count, thresholds);

    let reconciliation = reconcile(&aligned, input.reference, thresholds);
    issues.extend(reconciliation.issues.iter().cloned());

    let (booths, booth_issues) = build_booths(&names.ac_key, &reconciliation.rows);
    issues.extend(booth_issues);
    let has_nota = reconciliation.rows.iter().any(|r| r.nota.is_some());
    let result = from_booths(input.reference, &booths, has_nota, &names.party_ids);

    let signals = Signals {
        booth_count,
        alignment_flagged: aligned.alignment.flagged,
        resolver_flagged: names.resolution.is_none(),
        reconciliation_escalated: reconciliation.escalated(),
    };
    let tier = classify(&metrics, &signals, thresholds);
    info!(
        "process_constituency: {} {}: {} booths, {}",
        names.ac_key,
        input.year,
        booth_count,
        tier.as_str()
    );

    ConstituencyOutcome {
        ac_key: names.ac_key,
        resolution: names.resolution,
        state_key: names.state_key,
        year: input.year,
        result,
        tier,
        metrics,
        booths,
        alignment: Some(aligned.alignment),
        adjustments: reconciliation.adjustments,
        nota_adjustment: reconciliation.nota_adjustment,
        extraction_used: extraction.used,
        extraction_attempts: extraction.attempts.len(),
        issues,
    }
}

/// The outcome of a constituency whose processing crashed twice.
pub fn crashed_constituency(
    input: &ConstituencyInput,
    index: &SchemaIndex,
    detail: &str,
) -> ConstituencyOutcome {
    let names = resolve_names(input, index);
    let mut issues = names.issues.clone();
    issues.push(Issue::new(IssueCode::WorkerCrashed, detail));
    empty_outcome(input, names, issues, 0)
}
