//! Alignment of the raw numeric columns onto the official candidate list.

use log::{debug, info, warn};

use crate::config::*;
use crate::format::*;

/// Where the columns of a document were found.
#[derive(PartialEq, Debug, Clone)]
pub struct Alignment {
    pub format: DocumentFormat,
    /// Negative: leading candidate columns are missing. Positive: extraneous
    /// leading columns.
    pub offset: i32,
    /// For each candidate, the normalized column that holds its votes.
    pub column_map: Vec<Option<usize>>,
    pub nota_column: Option<usize>,
    pub total_valid_column: Option<usize>,
    pub rejected_column: Option<usize>,
    pub total_column: Option<usize>,
    /// Number of columns after normalization.
    pub width: usize,
    /// True if the candidates were greedily remapped after the offset.
    pub remapped: bool,
    pub aggregate_error: f64,
    pub confidence: f64,
    /// No window was below the error threshold.
    pub flagged: bool,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AlignedRow {
    pub raw_booth_label: String,
    pub provenance: Vec<Provenance>,
    /// In candidate order. `None` if the candidate has no column or the row
    /// has no value in it.
    pub votes: Vec<Option<i64>>,
    pub nota: Option<i64>,
    pub total_valid: Option<i64>,
    pub rejected: Option<i64>,
    pub total: Option<i64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AlignedMatrix {
    pub rows: Vec<AlignedRow>,
    pub alignment: Alignment,
}

impl AlignedMatrix {
    /// The candidates (by index) that have no column in the document.
    pub fn missing_candidates(&self) -> Vec<usize> {
        self.alignment
            .column_map
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// The per-candidate sums of the valid values.
    pub fn candidate_totals(&self, thresholds: &Thresholds) -> Vec<u64> {
        let n = self.alignment.column_map.len();
        let mut res = vec![0u64; n];
        for r in self.rows.iter() {
            for (i, v) in r.votes.iter().enumerate() {
                if let Some(v) = v {
                    if thresholds.is_valid_vote(*v) {
                        res[i] += *v as u64;
                    }
                }
            }
        }
        res
    }

    pub fn issues(&self) -> Vec<Issue> {
        let mut res = Vec::new();
        let a = &self.alignment;
        if a.remapped {
            let perm: Vec<String> = a
                .column_map
                .iter()
                .map(|c| match c {
                    Some(c) => c.to_string(),
                    None => "-".to_string(),
                })
                .collect();
            res.push(Issue::new(
                IssueCode::CandidateRemapped,
                format!("candidate columns remapped to [{}]", perm.join(", ")),
            ));
        }
        if a.flagged {
            res.push(Issue::new(
                IssueCode::AlignmentAmbiguous,
                format!(
                    "best alignment ({:?}, offset {}) has an aggregate error of {:.1}%",
                    a.format,
                    a.offset,
                    100.0 * a.aggregate_error
                ),
            ));
        }
        res
    }
}

// One way of reading the document: a format and its normalized rows.
struct Table {
    format: DocumentFormat,
    rows: Vec<Vec<Option<i64>>>,
    // Per column, the sum of the valid values.
    totals: Vec<u64>,
    width: usize,
}

fn build_table(matrix: &RawMatrix, format: DocumentFormat, thresholds: &Thresholds) -> Table {
    let layout = format.layout();
    let width = layout.width(matrix);
    let rows: Vec<Vec<Option<i64>>> = matrix
        .rows
        .iter()
        .map(|r| layout.normalize(r, width))
        .collect();
    let mut totals = vec![0u64; width];
    for r in rows.iter() {
        for (i, v) in r.iter().enumerate() {
            if let Some(v) = v {
                if thresholds.is_valid_vote(*v) {
                    totals[i] += *v as u64;
                }
            }
        }
    }
    Table {
        format,
        rows,
        totals,
        width,
    }
}

/// The offsets in the order they are tried: 0, -1, 1, -2, 2, ...
fn offset_order(max_offset: i32) -> Vec<i64> {
    let mut res = vec![0i64];
    for k in 1..=(max_offset.max(0) as i64) {
        res.push(-k);
        res.push(k);
    }
    res
}

fn in_range(col: i64, width: usize) -> Option<usize> {
    if col >= 0 && (col as usize) < width {
        Some(col as usize)
    } else {
        None
    }
}

fn offset_map(num_candidates: usize, offset: i64, width: usize) -> Vec<Option<usize>> {
    (0..num_candidates)
        .map(|i| in_range(i as i64 + offset, width))
        .collect()
}

fn tail_column(
    format: DocumentFormat,
    field: TailField,
    num_candidates: usize,
    offset: i64,
    width: usize,
) -> Option<usize> {
    format
        .layout()
        .tail_index(field, num_candidates as i64 + offset)
        .and_then(|c| in_range(c, width))
}

fn column_total(totals: &[u64], col: Option<usize>) -> f64 {
    col.and_then(|c| totals.get(c)).cloned().unwrap_or(0) as f64
}

/// The relative error of one total against its expected value.
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        if actual <= 0.0 {
            0.0
        } else {
            1.0
        }
    } else {
        (actual - expected).abs() / expected
    }
}

fn aggregate_error(
    totals: &[u64],
    column_map: &[Option<usize>],
    expected: &[f64],
    nota: Option<(Option<usize>, f64)>,
) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (col, e) in column_map.iter().zip(expected.iter()) {
        num += (column_total(totals, *col) - e).abs();
        den += e;
    }
    if let Some((col, e)) = nota {
        num += (column_total(totals, col) - e).abs();
        den += e;
    }
    if den <= 0.0 {
        if num <= 0.0 {
            0.0
        } else {
            1.0
        }
    } else {
        num / den
    }
}

/// The columns a candidate can be remapped to: all of them except the
/// totals and NOTA of the chosen layout.
fn remap_pool(width: usize, tail_columns: &[Option<usize>]) -> Vec<usize> {
    (0..width)
        .filter(|c| !tail_columns.contains(&Some(*c)))
        .collect()
}

/// Each candidate, largest expected total first, takes the closest column
/// of the pool that is still free. Ties go to the column nearest to its
/// position under the offset.
fn greedy_remap(totals: &[u64], expected: &[f64], pool: &[usize], offset: i64) -> Vec<Option<usize>> {
    let mut taken = vec![false; pool.len()];
    let mut order: Vec<usize> = (0..expected.len()).collect();
    order.sort_by(|a, b| {
        expected[*b]
            .partial_cmp(&expected[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(b))
    });

    let mut res: Vec<Option<usize>> = vec![None; expected.len()];
    for i in order {
        let home = i as i64 + offset;
        let mut best: Option<(usize, f64, i64)> = None;
        for (p, col) in pool.iter().enumerate() {
            if taken[p] {
                continue;
            }
            let dist = (totals[*col] as f64 - expected[i]).abs();
            let proximity = (*col as i64 - home).abs();
            let better = match best {
                None => true,
                Some((_, d, prox)) => dist < d || (dist == d && proximity < prox),
            };
            if better {
                best = Some((p, dist, proximity));
            }
        }
        if let Some((p, _, _)) = best {
            taken[p] = true;
            res[i] = Some(pool[p]);
        }
    }
    res
}

/// Maps the columns of the matrix onto the candidates of the reference.
///
/// The reference must have at least one candidate.
pub fn align(matrix: &RawMatrix, reference: &Reference, thresholds: &Thresholds) -> AlignedMatrix {
    let n = reference.candidates.len();
    let coverage = match reference.booth_coverage(matrix.rows.len()) {
        c if c > 0.0 => c,
        _ => 1.0,
    };
    let expected: Vec<f64> = reference
        .candidates
        .iter()
        .map(|c| c.official_votes as f64 * coverage)
        .collect();
    let expected_nota: Option<f64> = reference.official_nota.map(|v| v as f64 * coverage);

    let address = has_address_column(matrix);
    let formats: Vec<DocumentFormat> = if address {
        vec![DocumentFormat::AddressColumn]
    } else if expected_nota.is_some() {
        vec![
            DocumentFormat::Simple,
            DocumentFormat::NotaBeforeTotal,
            DocumentFormat::NotaAfterTotal,
        ]
    } else {
        vec![DocumentFormat::Simple]
    };
    let tables: Vec<Table> = formats
        .iter()
        .map(|f| build_table(matrix, *f, thresholds))
        .collect();

    // Offset and format are chosen together. Strict comparison: on ties the
    // earliest offset in the order wins.
    let mut best: Option<(usize, i64, f64)> = None;
    for offset in offset_order(thresholds.max_offset) {
        for (ti, t) in tables.iter().enumerate() {
            let map = offset_map(n, offset, t.width);
            let nota = expected_nota.map(|e| {
                (
                    tail_column(t.format, TailField::Nota, n, offset, t.width),
                    e,
                )
            });
            let err = aggregate_error(&t.totals, &map, &expected, nota);
            debug!("align: {:?} offset {}: error {:.4}", t.format, offset, err);
            let better = match best {
                Some((_, _, b)) => err < b,
                None => true,
            };
            if better {
                best = Some((ti, offset, err));
            }
        }
    }
    let (table_idx, offset, mut error) = best.unwrap_or((0, 0, 1.0));
    let table = &tables[table_idx];

    let format = if !address && expected_nota.is_none() {
        detect_from_arithmetic(
            &table.rows,
            n,
            offset,
            &[
                DocumentFormat::Simple,
                DocumentFormat::NotaBeforeTotal,
                DocumentFormat::NotaAfterTotal,
            ],
        )
    } else {
        table.format
    };
    let nota_column = tail_column(format, TailField::Nota, n, offset, table.width);
    let total_valid_column = tail_column(format, TailField::TotalValid, n, offset, table.width);
    let rejected_column = tail_column(format, TailField::Rejected, n, offset, table.width);
    let total_column = tail_column(format, TailField::Total, n, offset, table.width);

    let mut column_map = offset_map(n, offset, table.width);
    let mismatch = column_map
        .iter()
        .zip(expected.iter())
        .any(|(c, e)| relative_error(column_total(&table.totals, *c), *e) > thresholds.candidate_tolerance);
    let mut remapped = false;
    if mismatch {
        let pool = remap_pool(
            table.width,
            &[nota_column, total_valid_column, rejected_column, total_column],
        );
        let remap = greedy_remap(&table.totals, &expected, &pool, offset);
        let nota = expected_nota.map(|e| (nota_column, e));
        let remap_error = aggregate_error(&table.totals, &remap, &expected, nota);
        debug!(
            "align: remap {:?} error {:.4} (was {:.4})",
            remap, remap_error, error
        );
        if remap_error < error && remap != column_map {
            column_map = remap;
            error = remap_error;
            remapped = true;
        }
    }

    let flagged = error >= thresholds.alignment_max_error;
    let alignment = Alignment {
        format,
        offset: offset as i32,
        column_map,
        nota_column,
        total_valid_column,
        rejected_column,
        total_column,
        width: table.width,
        remapped,
        aggregate_error: error,
        confidence: (1.0 - error).max(0.0).min(1.0),
        flagged,
    };
    if flagged {
        warn!(
            "align: no window below {:.0}% error, best is {:?}",
            100.0 * thresholds.alignment_max_error,
            alignment
        );
    } else {
        info!(
            "align: format {:?} offset {} confidence {:.3}{}",
            alignment.format,
            alignment.offset,
            alignment.confidence,
            if remapped { " (remapped)" } else { "" }
        );
    }

    let cell = |r: &[Option<i64>], c: Option<usize>| c.and_then(|c| r.get(c).cloned().flatten());
    let rows: Vec<AlignedRow> = table
        .rows
        .iter()
        .zip(matrix.rows.iter())
        .map(|(r, raw)| AlignedRow {
            raw_booth_label: raw.raw_booth_label.clone(),
            provenance: raw.provenance.clone(),
            votes: alignment.column_map.iter().map(|c| cell(r, *c)).collect(),
            nota: cell(r, alignment.nota_column),
            total_valid: cell(r, alignment.total_valid_column),
            rejected: cell(r, alignment.rejected_column),
            total: cell(r, alignment.total_column),
        })
        .collect();

    AlignedMatrix { rows, alignment }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[i64]]) -> RawMatrix {
        RawMatrix {
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, f)| RawRow {
                    raw_booth_label: (i + 1).to_string(),
                    numeric_fields: f.to_vec(),
                    has_text: false,
                    provenance: vec![Provenance {
                        page: 1,
                        line: i as u32 + 1,
                    }],
                })
                .collect(),
        }
    }

    fn reference(totals: &[u64]) -> Reference {
        Reference {
            candidates: totals
                .iter()
                .enumerate()
                .map(|(i, v)| ReferenceCandidate {
                    name: format!("CANDIDATE {}", i + 1),
                    party: "IND".to_string(),
                    official_votes: *v,
                })
                .collect(),
            ..Reference::default()
        }
    }

    #[test]
    fn offsets_are_tried_from_zero() {
        assert_eq!(offset_order(3), vec![0, -1, 1, -2, 2, -3, 3]);
    }

    #[test]
    fn nine_columns_seven_candidates() {
        let m = matrix(&[
            &[100, 200, 50, 30, 20, 10, 5, 415, 3],
            &[120, 180, 60, 25, 15, 12, 8, 420, 2],
            &[90, 210, 40, 35, 25, 8, 7, 415, 1],
        ]);
        let r = reference(&[310, 590, 150, 90, 60, 30, 20]);
        let a = align(&m, &r, &Thresholds::DEFAULT);
        assert_eq!(a.alignment.offset, 0);
        assert_eq!(a.alignment.format, DocumentFormat::Simple);
        assert!(!a.alignment.flagged);
        assert!(a.alignment.confidence > 1.0 - Thresholds::DEFAULT.alignment_max_error);
        assert_eq!(a.alignment.total_valid_column, Some(7));
        assert_eq!(a.alignment.rejected_column, Some(8));
        assert_eq!(a.alignment.total_column, None);
        assert_eq!(a.rows[1].votes[6], Some(8));
        assert_eq!(a.rows[1].total_valid, Some(420));
        assert!(a.issues().is_empty());
    }

    #[test]
    fn leading_serial_column() {
        let m = matrix(&[
            &[1, 100, 50, 10, 160, 2, 162],
            &[2, 80, 70, 20, 170, 1, 171],
            &[3, 90, 60, 15, 165, 0, 165],
        ]);
        let r = reference(&[270, 180, 45]);
        let a = align(&m, &r, &Thresholds::DEFAULT);
        assert_eq!(a.alignment.offset, 1);
        assert_eq!(a.alignment.total_valid_column, Some(4));
        assert_eq!(a.rows[0].votes, vec![Some(100), Some(50), Some(10)]);
    }

    #[test]
    fn swapped_columns_are_remapped() {
        let m = matrix(&[&[250, 500, 100, 850, 5, 855], &[250, 500, 100, 850, 5, 855]]);
        let r = reference(&[1000, 500, 200]);
        let a = align(&m, &r, &Thresholds::DEFAULT);
        assert_eq!(a.alignment.offset, 0);
        assert!(a.alignment.remapped);
        assert_eq!(a.alignment.column_map, vec![Some(1), Some(0), Some(2)]);
        assert_eq!(a.alignment.aggregate_error, 0.0);
        assert_eq!(a.rows[0].votes, vec![Some(500), Some(250), Some(100)]);
        assert_eq!(a.issues()[0].code, IssueCode::CandidateRemapped);
    }

    #[test]
    fn remap_reaches_columns_outside_the_window() {
        // A stray column between the first and second candidates pushes the
        // best window one column to the right, past the first candidate.
        let m = matrix(&[&[300, 200, 150, 50, 500, 2, 502], &[300, 200, 150, 50, 500, 2, 502]]);
        let r = reference(&[600, 300, 100]);
        let a = align(&m, &r, &Thresholds::DEFAULT);
        assert_eq!(a.alignment.offset, 1);
        assert!(a.alignment.remapped);
        assert_eq!(a.alignment.column_map, vec![Some(0), Some(2), Some(3)]);
        assert_eq!(a.alignment.aggregate_error, 0.0);
        assert_eq!(a.alignment.total_valid_column, Some(4));
        assert_eq!(a.rows[0].votes, vec![Some(300), Some(150), Some(50)]);
        assert_eq!(a.rows[0].total_valid, Some(500));
    }

    #[test]
    fn remap_pool_skips_totals() {
        assert_eq!(remap_pool(6, &[None, Some(3), Some(4), Some(5)]), vec![0, 1, 2]);
    }

    #[test]
    fn partial_documents_use_coverage() {
        // 6 of 10 booths, each candidate at 60% of its official total.
        let m = matrix(&[
            &[100, 50, 150, 0, 150],
            &[100, 50, 150, 0, 150],
            &[100, 50, 150, 0, 150],
            &[100, 50, 150, 0, 150],
            &[100, 50, 150, 0, 150],
            &[100, 50, 150, 0, 150],
        ]);
        let mut r = reference(&[1000, 500]);
        r.expected_booths = Some(10);
        let a = align(&m, &r, &Thresholds::DEFAULT);
        assert_eq!(a.alignment.offset, 0);
        assert!(!a.alignment.flagged);
        assert!(a.alignment.aggregate_error < 1e-9);
    }

    #[test]
    fn nota_format_chosen_with_offset() {
        // Two candidates, NOTA, TotalValid, Rejected, Total.
        let m = matrix(&[&[100, 50, 7, 157, 1, 158], &[80, 40, 3, 123, 0, 123]]);
        let mut r = reference(&[180, 90]);
        r.official_nota = Some(10);
        let a = align(&m, &r, &Thresholds::DEFAULT);
        assert_eq!(a.alignment.format, DocumentFormat::NotaBeforeTotal);
        assert_eq!(a.alignment.nota_column, Some(2));
        assert_eq!(a.rows[0].nota, Some(7));
        assert_eq!(a.rows[0].total_valid, Some(157));
    }

    #[test]
    fn hopeless_alignment_is_flagged() {
        let m = matrix(&[&[1, 2, 3, 0, 3], &[1, 2, 3, 0, 3]]);
        let r = reference(&[10000, 5000]);
        let a = align(&m, &r, &Thresholds::DEFAULT);
        assert!(a.alignment.flagged);
        assert!(a
            .issues()
            .iter()
            .any(|i| i.code == IssueCode::AlignmentAmbiguous));
    }
}
