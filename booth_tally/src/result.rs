// ********* Output data structures ***********

use std::collections::HashMap;

use log::{debug, warn};

use crate::booth::{booth_id, BoothKind, BoothNumber};
use crate::config::*;
use crate::reconcile::ReconciledRow;

/// One polling station of an assembly constituency.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Booth {
    /// `{acId}-{boothNo}`
    pub id: String,
    /// The normalized booth number, with its suffix.
    pub number: String,
    pub kind: BoothKind,
    pub raw_label: String,
    /// In candidate order.
    pub votes: Vec<u64>,
    pub valid_votes: u64,
    pub rejected_votes: u64,
    pub nota_votes: u64,
    pub total_votes: u64,
    pub provenance: Vec<Provenance>,
}

/// Where the candidate totals of a result come from.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VotesSource {
    Booths,
    /// No booth could be extracted: the official totals are reported.
    Reference,
}

impl VotesSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotesSource::Booths => "booths",
            VotesSource::Reference => "reference",
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct CandidateResult {
    pub name: String,
    pub party: String,
    /// The canonical party identifier, if the party label was resolved.
    pub party_id: Option<String>,
    /// 1 for the winner.
    pub position: u32,
    pub votes: u64,
    /// Percentage of the valid votes.
    pub vote_share: f64,
    /// Less than a sixth of the valid votes.
    pub deposit_lost: bool,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ElectionResult {
    /// Sorted by position.
    pub candidates: Vec<CandidateResult>,
    pub valid_votes: u64,
    pub nota_votes: Option<u64>,
    pub rejected_votes: Option<u64>,
    pub total_votes: u64,
    pub electors: Option<u64>,
    /// Percentage of the electors who voted.
    pub turnout: Option<f64>,
    pub winner: Option<String>,
    pub margin: u64,
    pub margin_pct: f64,
    /// Effective number of parties (Laakso-Taagepera).
    pub enop: f64,
    pub votes_source: VotesSource,
}

pub fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}

/// Builds the booths of one constituency from the reconciled rows.
///
/// Booths whose number appears twice are kept under a `-dup{k}` identifier
/// and reported.
pub fn build_booths(ac_id: &str, rows: &[ReconciledRow]) -> (Vec<Booth>, Vec<Issue>) {
    let mut issues: Vec<Issue> = Vec::new();
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut booths: Vec<Booth> = Vec::with_capacity(rows.len());
    for r in rows.iter() {
        let (number, kind, base) = match BoothNumber::parse(&r.raw_booth_label) {
            Some(b) => (b.canonical(), b.kind(), booth_id(ac_id, &b)),
            None => {
                debug!(
                    "build_booths: label {:?} kept as printed",
                    r.raw_booth_label
                );
                let number = r.raw_booth_label.trim().to_string();
                let base = format!("{}-{}", ac_id, number);
                (number, BoothKind::Regular, base)
            }
        };
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        let id = if *count > 1 {
            let id = format!("{}-dup{}", base, *count - 1);
            warn!("build_booths: duplicate booth {}, stored as {}", base, id);
            issues.push(Issue::for_booth(
                IssueCode::DuplicateBooth,
                &id,
                format!("booth number {} appears more than once", number),
            ));
            id
        } else {
            base
        };

        let valid_votes: u64 = r.votes.iter().sum();
        let nota_votes = r.nota.unwrap_or(0);
        let rejected_votes = r.rejected.unwrap_or(0);
        booths.push(Booth {
            id,
            number,
            kind,
            raw_label: r.raw_booth_label.clone(),
            votes: r.votes.clone(),
            valid_votes,
            rejected_votes,
            nota_votes,
            total_votes: valid_votes + nota_votes + rejected_votes,
            provenance: r.provenance.clone(),
        });
    }
    (booths, issues)
}

/// The aggregate result from per-candidate totals in reference order.
pub fn aggregate(
    reference: &Reference,
    votes: &[u64],
    nota_votes: Option<u64>,
    rejected_votes: Option<u64>,
    party_ids: &[Option<String>],
    votes_source: VotesSource,
) -> ElectionResult {
    let valid_votes: u64 = votes.iter().sum();

    // Rank by votes, ties broken by the order of the document.
    let mut order: Vec<usize> = (0..votes.len()).collect();
    order.sort_by(|a, b| votes[*b].cmp(&votes[*a]).then(a.cmp(b)));

    let share = |v: u64| {
        if valid_votes == 0 {
            0.0
        } else {
            v as f64 / valid_votes as f64
        }
    };
    let candidates: Vec<CandidateResult> = order
        .iter()
        .enumerate()
        .map(|(pos, i)| {
            let c = &reference.candidates[*i];
            CandidateResult {
                name: c.name.clone(),
                party: c.party.clone(),
                party_id: party_ids.get(*i).cloned().flatten(),
                position: pos as u32 + 1,
                votes: votes[*i],
                vote_share: round4(100.0 * share(votes[*i])),
                deposit_lost: valid_votes > 0 && votes[*i] * 6 < valid_votes,
            }
        })
        .collect();

    let first = candidates.first().map(|c| c.votes).unwrap_or(0);
    let second = candidates.get(1).map(|c| c.votes).unwrap_or(0);
    let margin = first - second;
    let sum_sq: f64 = votes.iter().map(|v| share(*v) * share(*v)).sum();
    let enop = if sum_sq > 0.0 { round4(1.0 / sum_sq) } else { 0.0 };
    let total_votes = valid_votes + nota_votes.unwrap_or(0) + rejected_votes.unwrap_or(0);
    let turnout = match reference.electors {
        Some(e) if e > 0 => Some(round4(100.0 * total_votes as f64 / e as f64)),
        _ => None,
    };
    let winner = if valid_votes > 0 {
        candidates.first().map(|c| c.name.clone())
    } else {
        None
    };

    ElectionResult {
        candidates,
        valid_votes,
        nota_votes,
        rejected_votes,
        total_votes,
        electors: reference.electors,
        turnout,
        winner,
        margin,
        margin_pct: round4(100.0 * share(margin)),
        enop,
        votes_source,
    }
}

/// The result of a constituency from its booths.
pub fn from_booths(
    reference: &Reference,
    booths: &[Booth],
    has_nota: bool,
    party_ids: &[Option<String>],
) -> ElectionResult {
    let mut votes = vec![0u64; reference.candidates.len()];
    for b in booths.iter() {
        for (i, v) in b.votes.iter().enumerate() {
            if i < votes.len() {
                votes[i] += *v;
            }
        }
    }
    let nota = if has_nota {
        Some(booths.iter().map(|b| b.nota_votes).sum())
    } else {
        None
    };
    let rejected = booths.iter().map(|b| b.rejected_votes).sum();
    aggregate(
        reference,
        &votes,
        nota,
        Some(rejected),
        party_ids,
        VotesSource::Booths,
    )
}

/// The result of a constituency with no booth data: the official totals.
pub fn from_reference(reference: &Reference, party_ids: &[Option<String>]) -> ElectionResult {
    let votes: Vec<u64> = reference
        .candidates
        .iter()
        .map(|c| c.official_votes)
        .collect();
    aggregate(
        reference,
        &votes,
        reference.official_nota,
        reference.official_rejected,
        party_ids,
        VotesSource::Reference,
    )
}
