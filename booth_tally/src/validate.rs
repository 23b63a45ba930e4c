//! Coverage metrics and quality tiers.

use log::debug;

use crate::align::{relative_error, AlignedMatrix};
use crate::config::*;

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Metrics {
    /// Booths found over booths expected, capped at 1.
    pub booth_coverage: f64,
    /// Extracted valid votes over official valid votes.
    pub vote_coverage: f64,
    /// The largest relative error of a candidate before reconciliation, in
    /// percent, against the official total adjusted for booth coverage.
    pub max_candidate_error_pct: f64,
}

impl Metrics {
    pub const EMPTY: Metrics = Metrics {
        booth_coverage: 0.0,
        vote_coverage: 0.0,
        max_candidate_error_pct: 100.0,
    };
}

/// Low-confidence signals raised by the earlier stages.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct Signals {
    pub booth_count: usize,
    pub alignment_flagged: bool,
    pub resolver_flagged: bool,
    pub reconciliation_escalated: bool,
}

/// Computes the metrics from the aligned (not yet reconciled) matrix.
pub fn metrics(
    aligned: &AlignedMatrix,
    reference: &Reference,
    booth_count: usize,
    thresholds: &Thresholds,
) -> Metrics {
    if booth_count == 0 {
        return Metrics::EMPTY;
    }
    let booth_coverage = reference.booth_coverage(booth_count);
    let totals = aligned.candidate_totals(thresholds);
    let extracted_valid: u64 = totals.iter().sum();
    let official_valid = reference.official_valid();
    let vote_coverage = if official_valid > 0 {
        extracted_valid as f64 / official_valid as f64
    } else {
        0.0
    };
    let max_error = totals
        .iter()
        .zip(reference.candidates.iter())
        .map(|(t, c)| relative_error(*t as f64, c.official_votes as f64 * booth_coverage))
        .fold(0.0f64, f64::max);
    Metrics {
        booth_coverage,
        vote_coverage,
        max_candidate_error_pct: 100.0 * max_error,
    }
}

/// The quality tier. The first matching rule wins.
pub fn classify(metrics: &Metrics, signals: &Signals, thresholds: &Thresholds) -> QualityTier {
    if signals.booth_count == 0 {
        return QualityTier::Empty;
    }
    if signals.alignment_flagged || signals.resolver_flagged || signals.reconciliation_escalated {
        debug!("classify: flagged by {:?}", signals);
        return QualityTier::NeedsReview;
    }
    let error = metrics.max_candidate_error_pct / 100.0;
    let bands = [
        (QualityTier::Excellent, thresholds.excellent),
        (QualityTier::Good, thresholds.good),
        (QualityTier::Partial, thresholds.partial),
    ];
    for (tier, band) in bands.iter() {
        if metrics.booth_coverage >= band.min_coverage && error < band.max_error {
            return *tier;
        }
    }
    QualityTier::Poor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align;

    fn m(booth_coverage: f64, max_candidate_error_pct: f64) -> Metrics {
        Metrics {
            booth_coverage,
            vote_coverage: booth_coverage,
            max_candidate_error_pct,
        }
    }

    fn signals(booth_count: usize) -> Signals {
        Signals {
            booth_count,
            ..Signals::default()
        }
    }

    #[test]
    fn tiers() {
        let t = Thresholds::DEFAULT;
        assert_eq!(classify(&m(1.0, 0.0), &signals(10), &t), QualityTier::Excellent);
        assert_eq!(classify(&m(0.95, 4.9), &signals(10), &t), QualityTier::Excellent);
        assert_eq!(classify(&m(0.95, 5.0), &signals(10), &t), QualityTier::Good);
        assert_eq!(classify(&m(0.85, 1.0), &signals(10), &t), QualityTier::Good);
        assert_eq!(classify(&m(0.6, 1.0), &signals(10), &t), QualityTier::Partial);
        assert_eq!(classify(&m(0.6, 25.0), &signals(10), &t), QualityTier::Poor);
        assert_eq!(classify(&m(0.3, 0.0), &signals(10), &t), QualityTier::Poor);
    }

    #[test]
    fn flags_and_empty_come_first() {
        let t = Thresholds::DEFAULT;
        assert_eq!(
            classify(&Metrics::EMPTY, &signals(0), &t),
            QualityTier::Empty
        );
        let flagged = Signals {
            booth_count: 10,
            alignment_flagged: true,
            ..Signals::default()
        };
        assert_eq!(classify(&m(1.0, 0.0), &flagged, &t), QualityTier::NeedsReview);
        let escalated = Signals {
            booth_count: 10,
            reconciliation_escalated: true,
            ..Signals::default()
        };
        assert_eq!(classify(&m(1.0, 0.0), &escalated, &t), QualityTier::NeedsReview);
    }

    #[test]
    fn partial_document_metrics() {
        let matrix = RawMatrix {
            rows: (0..6)
                .map(|i| RawRow {
                    raw_booth_label: (i + 1).to_string(),
                    numeric_fields: vec![100, 50, 150, 0, 150],
                    has_text: false,
                    provenance: vec![],
                })
                .collect(),
        };
        let reference = Reference {
            candidates: vec![
                ReferenceCandidate {
                    name: "A".to_string(),
                    party: "P".to_string(),
                    official_votes: 1000,
                },
                ReferenceCandidate {
                    name: "B".to_string(),
                    party: "Q".to_string(),
                    official_votes: 500,
                },
            ],
            expected_booths: Some(10),
            ..Reference::default()
        };
        let aligned = align(&matrix, &reference, &Thresholds::DEFAULT);
        let metrics = metrics(&aligned, &reference, 6, &Thresholds::DEFAULT);
        assert!((metrics.booth_coverage - 0.6).abs() < 1e-12);
        assert!((metrics.vote_coverage - 0.6).abs() < 1e-12);
        assert!(metrics.max_candidate_error_pct < 1e-6);
        assert_eq!(
            classify(&metrics, &signals(6), &Thresholds::DEFAULT),
            QualityTier::Partial
        );
    }
}
