//! Bounded corrections of the booth values against the official totals.
//!
//! Three corrections exist, and all of them distribute an official total over
//! the booths with exact integer arithmetic: proportional scaling of a column,
//! the same scaling for minor discrepancies, and filling a single dropped
//! column. Everything else is escalated and left as extracted.

use log::{debug, info, warn};

use crate::align::{relative_error, AlignedMatrix};
use crate::config::*;

/// What happened to the column of one candidate (or NOTA).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Adjustment {
    Unchanged,
    Scaled { from: u64, to: u64 },
    GapFilled { to: u64 },
    Escalated { extracted: u64, official: u64 },
}

impl Adjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Adjustment::Unchanged => "unchanged",
            Adjustment::Scaled { .. } => "scaled",
            Adjustment::GapFilled { .. } => "gapFilled",
            Adjustment::Escalated { .. } => "escalated",
        }
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, Adjustment::Escalated { .. })
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReconciledRow {
    pub raw_booth_label: String,
    pub provenance: Vec<Provenance>,
    /// In candidate order.
    pub votes: Vec<u64>,
    pub nota: Option<u64>,
    pub rejected: Option<u64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Reconciliation {
    pub rows: Vec<ReconciledRow>,
    /// In candidate order.
    pub adjustments: Vec<Adjustment>,
    /// `None` if the official NOTA count is unknown.
    pub nota_adjustment: Option<Adjustment>,
    pub booth_coverage: f64,
    pub issues: Vec<Issue>,
}

impl Reconciliation {
    /// True if some column could not be brought to its official total.
    pub fn escalated(&self) -> bool {
        self.adjustments.iter().any(|a| a.is_escalated())
            || self.nota_adjustment.map_or(false, |a| a.is_escalated())
    }
}

/// Distributes `target` proportionally to `weights`, exactly.
///
/// Each share is the floor of `weight * target / sum`. The deficit goes one
/// unit at a time to the largest remainders, ties broken by position. With
/// all weights at zero, the target is spread evenly.
pub fn largest_remainder(weights: &[u64], target: u64) -> Vec<u64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let sum: u128 = weights.iter().map(|w| *w as u128).sum();
    if sum == 0 {
        let q = target / n as u64;
        let r = (target % n as u64) as usize;
        return (0..n).map(|i| if i < r { q + 1 } else { q }).collect();
    }

    let mut shares: Vec<u64> = Vec::with_capacity(n);
    let mut remainders: Vec<(u128, usize)> = Vec::with_capacity(n);
    for (i, w) in weights.iter().enumerate() {
        let prod = *w as u128 * target as u128;
        shares.push((prod / sum) as u64);
        remainders.push((prod % sum, i));
    }
    let allocated: u64 = shares.iter().sum();
    let deficit = (target - allocated) as usize;
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, i) in remainders.iter().take(deficit) {
        shares[*i] += 1;
    }
    shares
}

// The values of one column after the invalid ones were zeroed.
struct Column<'a> {
    name: &'a str,
    values: Vec<u64>,
    present: bool,
    official: u64,
}

impl<'a> Column<'a> {
    fn extracted(&self) -> u64 {
        self.values.iter().sum()
    }

    // A column that the document clearly lost: absent, or all zeros while the
    // candidate got votes.
    fn is_dropped(&self) -> bool {
        self.official > 0 && (!self.present || self.extracted() == 0)
    }
}

fn sanitize(
    v: Option<i64>,
    label: &str,
    what: &str,
    thresholds: &Thresholds,
    issues: &mut Vec<Issue>,
) -> u64 {
    match v {
        Some(v) if thresholds.is_valid_vote(v) => v as u64,
        Some(v) => {
            issues.push(Issue::for_booth(
                IssueCode::InvalidVoteValue,
                label,
                format!("{}: value {} replaced by 0", what, v),
            ));
            0
        }
        None => 0,
    }
}

fn adjust(
    col: &mut Column,
    coverage: f64,
    gap_fill_allowed: bool,
    weights: &[u64],
    thresholds: &Thresholds,
) -> Adjustment {
    let extracted = col.extracted();
    let official = col.official;
    if extracted == official {
        return Adjustment::Unchanged;
    }
    if extracted > 0 && official > 0 {
        let ratio = extracted as f64 / official as f64;
        let minor = relative_error(extracted as f64, official as f64) <= thresholds.minor_tolerance;
        let (lo, hi) = thresholds.scaling_band;
        let partial = coverage < 1.0 && ratio >= lo && ratio <= hi;
        if minor || partial {
            debug!(
                "adjust: {}: scaling {} -> {} (ratio {:.3}, coverage {:.3})",
                col.name, extracted, official, ratio, coverage
            );
            col.values = largest_remainder(&col.values, official);
            return Adjustment::Scaled {
                from: extracted,
                to: official,
            };
        }
    }
    if gap_fill_allowed && col.is_dropped() {
        debug!("adjust: {}: filling {} votes", col.name, official);
        col.values = largest_remainder(weights, official);
        return Adjustment::GapFilled { to: official };
    }
    Adjustment::Escalated {
        extracted,
        official,
    }
}

fn issue_for(adj: &Adjustment, name: &str) -> Option<Issue> {
    match adj {
        Adjustment::Unchanged => None,
        Adjustment::Scaled { from, to } => Some(Issue::new(
            IssueCode::ProportionallyScaled,
            format!("{}: scaled from {} to {}", name, from, to),
        )),
        Adjustment::GapFilled { to } => Some(Issue::new(
            IssueCode::ColumnGapFilled,
            format!("{}: missing column filled with {} votes", name, to),
        )),
        Adjustment::Escalated {
            extracted,
            official,
        } => Some(Issue::new(
            IssueCode::ReconciliationOverTolerance,
            format!(
                "{}: extracted {} votes, official total is {}",
                name, extracted, official
            ),
        )),
    }
}

/// Brings the aligned matrix to the official totals where the corrections
/// allow it.
pub fn reconcile(
    aligned: &AlignedMatrix,
    reference: &Reference,
    thresholds: &Thresholds,
) -> Reconciliation {
    let mut issues: Vec<Issue> = Vec::new();
    let coverage = reference.booth_coverage(aligned.rows.len());

    let mut columns: Vec<Column> = reference
        .candidates
        .iter()
        .enumerate()
        .map(|(j, c)| Column {
            name: &c.name,
            values: Vec::with_capacity(aligned.rows.len()),
            present: aligned.alignment.column_map.get(j).cloned().flatten().is_some(),
            official: c.official_votes,
        })
        .collect();
    let mut nota_values: Vec<u64> = Vec::new();
    let mut rejected: Vec<Option<u64>> = Vec::new();
    for r in aligned.rows.iter() {
        for (j, col) in columns.iter_mut().enumerate() {
            let v = r.votes.get(j).cloned().flatten();
            col.values
                .push(sanitize(v, &r.raw_booth_label, col.name, thresholds, &mut issues));
        }
        nota_values.push(sanitize(
            r.nota,
            &r.raw_booth_label,
            "NOTA",
            thresholds,
            &mut issues,
        ));
        rejected.push(
            r.rejected
                .map(|v| sanitize(Some(v), &r.raw_booth_label, "rejected", thresholds, &mut issues)),
        );
    }

    // Weights for gap filling: what each booth gave to the present columns.
    let weights: Vec<u64> = (0..aligned.rows.len())
        .map(|b| {
            columns
                .iter()
                .filter(|c| !c.is_dropped())
                .map(|c| c.values[b])
                .sum()
        })
        .collect();
    let dropped = columns.iter().filter(|c| c.is_dropped()).count();
    let gap_fill_allowed = dropped == 1 && coverage >= thresholds.gap_fill_min_coverage;

    let mut adjustments: Vec<Adjustment> = Vec::new();
    for col in columns.iter_mut() {
        let adj = adjust(col, coverage, gap_fill_allowed, &weights, thresholds);
        if let Some(i) = issue_for(&adj, col.name) {
            issues.push(i);
        }
        adjustments.push(adj);
    }

    let nota_present = aligned.alignment.nota_column.is_some();
    let mut nota_adjustment = None;
    let mut nota_out: Vec<Option<u64>> = if nota_present {
        nota_values.iter().map(|v| Some(*v)).collect()
    } else {
        vec![None; aligned.rows.len()]
    };
    if let Some(official) = reference.official_nota {
        let mut col = Column {
            name: "NOTA",
            values: nota_values,
            present: nota_present,
            official,
        };
        let nota_gap = col.is_dropped() && coverage >= thresholds.gap_fill_min_coverage;
        let adj = adjust(&mut col, coverage, nota_gap, &weights, thresholds);
        if let Some(i) = issue_for(&adj, "NOTA") {
            issues.push(i);
        }
        if nota_present || matches!(adj, Adjustment::GapFilled { .. }) {
            nota_out = col.values.iter().map(|v| Some(*v)).collect();
        }
        nota_adjustment = Some(adj);
    }

    let rows: Vec<ReconciledRow> = aligned
        .rows
        .iter()
        .enumerate()
        .map(|(b, r)| ReconciledRow {
            raw_booth_label: r.raw_booth_label.clone(),
            provenance: r.provenance.clone(),
            votes: columns.iter().map(|c| c.values[b]).collect(),
            nota: nota_out[b],
            rejected: rejected[b],
        })
        .collect();

    let res = Reconciliation {
        rows,
        adjustments,
        nota_adjustment,
        booth_coverage: coverage,
        issues,
    };
    if res.escalated() {
        warn!("reconcile: some columns are over tolerance and left uncorrected");
    } else {
        info!(
            "reconcile: {} columns adjusted",
            res.adjustments
                .iter()
                .filter(|a| **a != Adjustment::Unchanged)
                .count()
        );
    }
    res
}
