//! The closed set of document formats and their column layouts.
//!
//! All formats start with the candidate columns. They differ by the fields
//! that follow them and by how a row is anchored when it has more or fewer
//! fields than the table.

use log::debug;

use crate::config::{RawMatrix, RawRow};

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum DocumentFormat {
    /// `candidates..., TotalValid, Rejected, Total`
    Simple,
    /// Like `Simple`, with a text address after the booth label.
    AddressColumn,
    /// `candidates..., NOTA, TotalValid, Rejected, Total`
    NotaBeforeTotal,
    /// `candidates..., TotalValid, Rejected, NOTA, Total`
    NotaAfterTotal,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 4] = [
        DocumentFormat::Simple,
        DocumentFormat::AddressColumn,
        DocumentFormat::NotaBeforeTotal,
        DocumentFormat::NotaAfterTotal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Simple => "simple",
            DocumentFormat::AddressColumn => "addressColumn",
            DocumentFormat::NotaBeforeTotal => "notaBeforeTotal",
            DocumentFormat::NotaAfterTotal => "notaAfterTotal",
        }
    }

    pub fn layout(&self) -> &'static dyn ColumnLayout {
        match self {
            DocumentFormat::Simple => &SimpleLayout,
            DocumentFormat::AddressColumn => &AddressColumnLayout,
            DocumentFormat::NotaBeforeTotal => &NotaBeforeTotalLayout,
            DocumentFormat::NotaAfterTotal => &NotaAfterTotalLayout,
        }
    }

    pub fn has_nota(&self) -> bool {
        self.layout().tail().contains(&TailField::Nota)
    }
}

/// The fields that follow the candidate columns.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum TailField {
    Nota,
    TotalValid,
    Rejected,
    Total,
}

/// How the numeric fields of a row map onto the columns of a format.
pub trait ColumnLayout: Sync {
    fn format(&self) -> DocumentFormat;

    /// The fields after the candidates, in document order. Trailing fields
    /// may be absent from a given document.
    fn tail(&self) -> &'static [TailField];

    /// The number of columns of the normalized table.
    fn width(&self, matrix: &RawMatrix) -> usize {
        matrix.width()
    }

    /// Places the fields of a row in a table of the given width.
    ///
    /// The default layout anchors rows on the left: missing fields are the
    /// trailing ones.
    fn normalize(&self, row: &RawRow, width: usize) -> Vec<Option<i64>> {
        (0..width)
            .map(|i| row.numeric_fields.get(i).cloned())
            .collect()
    }

    /// The index of a tail field, for a table where the candidate columns end
    /// at `candidates_end` (exclusive).
    fn tail_index(&self, field: TailField, candidates_end: i64) -> Option<i64> {
        self.tail()
            .iter()
            .position(|f| *f == field)
            .map(|p| candidates_end + p as i64)
    }
}

struct SimpleLayout;
struct AddressColumnLayout;
struct NotaBeforeTotalLayout;
struct NotaAfterTotalLayout;

const SIMPLE_TAIL: [TailField; 3] = [TailField::TotalValid, TailField::Rejected, TailField::Total];

impl ColumnLayout for SimpleLayout {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Simple
    }

    fn tail(&self) -> &'static [TailField] {
        &SIMPLE_TAIL
    }
}

impl ColumnLayout for AddressColumnLayout {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::AddressColumn
    }

    fn tail(&self) -> &'static [TailField] {
        &SIMPLE_TAIL
    }

    /// Digits in an address (house or ward numbers) add spurious leading
    /// fields, so the table is as wide as the most common row.
    fn width(&self, matrix: &RawMatrix) -> usize {
        modal_width(matrix)
    }

    /// Rows are anchored on the right: the totals are always last, and the
    /// spurious fields are at the start.
    fn normalize(&self, row: &RawRow, width: usize) -> Vec<Option<i64>> {
        let fields = &row.numeric_fields;
        if fields.len() >= width {
            fields[fields.len() - width..]
                .iter()
                .map(|v| Some(*v))
                .collect()
        } else {
            let pad = width - fields.len();
            (0..width)
                .map(|i| if i < pad { None } else { Some(fields[i - pad]) })
                .collect()
        }
    }
}

impl ColumnLayout for NotaBeforeTotalLayout {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::NotaBeforeTotal
    }

    fn tail(&self) -> &'static [TailField] {
        &[
            TailField::Nota,
            TailField::TotalValid,
            TailField::Rejected,
            TailField::Total,
        ]
    }
}

impl ColumnLayout for NotaAfterTotalLayout {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::NotaAfterTotal
    }

    fn tail(&self) -> &'static [TailField] {
        &[
            TailField::TotalValid,
            TailField::Rejected,
            TailField::Nota,
            TailField::Total,
        ]
    }
}

/// The most common number of fields. The largest one wins ties.
pub fn modal_width(matrix: &RawMatrix) -> usize {
    let mut counts: std::collections::BTreeMap<usize, usize> = std::collections::BTreeMap::new();
    for r in matrix.rows.iter() {
        *counts.entry(r.numeric_fields.len()).or_insert(0) += 1;
    }
    let mut best: (usize, usize) = (0, 0);
    for (w, c) in counts.iter() {
        if *c >= best.1 {
            best = (*w, *c);
        }
    }
    best.0
}

/// True when most rows carry text next to their numbers.
pub fn has_address_column(matrix: &RawMatrix) -> bool {
    let with_text = matrix.rows.iter().filter(|r| r.has_text).count();
    !matrix.rows.is_empty() && 2 * with_text > matrix.rows.len()
}

fn field_at(row: &[Option<i64>], idx: Option<i64>) -> Option<i64> {
    let i = idx?;
    if i < 0 {
        return None;
    }
    row.get(i as usize).cloned().flatten()
}

/// Checks the totals of one normalized row against a layout.
///
/// `TotalValid` may or may not include NOTA, and `Total` may or may not
/// include it either, depending on the printing authority.
fn row_is_consistent(
    layout: &dyn ColumnLayout,
    row: &[Option<i64>],
    num_candidates: usize,
    offset: i64,
) -> bool {
    let end = num_candidates as i64 + offset;
    let candidate_sum: i64 = (0..num_candidates as i64)
        .map(|i| field_at(row, Some(i + offset)).unwrap_or(0))
        .sum();
    let nota = field_at(row, layout.tail_index(TailField::Nota, end));
    let total_valid = match field_at(row, layout.tail_index(TailField::TotalValid, end)) {
        Some(v) => v,
        None => return false,
    };
    let nota_v = nota.unwrap_or(0);
    if total_valid != candidate_sum && total_valid != candidate_sum + nota_v {
        return false;
    }
    if layout.tail().contains(&TailField::Nota) && nota.is_none() {
        return false;
    }
    let rejected = field_at(row, layout.tail_index(TailField::Rejected, end));
    let total = field_at(row, layout.tail_index(TailField::Total, end));
    match (rejected, total) {
        (Some(r), Some(t)) => t == total_valid + r || t == total_valid + r + nota_v,
        _ => true,
    }
}

/// Picks the format whose totals agree with the most rows.
///
/// Used when the official NOTA count is not known. Ties go to the format that
/// comes first in `candidates`.
pub fn detect_from_arithmetic(
    rows: &[Vec<Option<i64>>],
    num_candidates: usize,
    offset: i64,
    candidates: &[DocumentFormat],
) -> DocumentFormat {
    let mut best: Option<(DocumentFormat, usize)> = None;
    for f in candidates.iter() {
        let layout = f.layout();
        let count = rows
            .iter()
            .filter(|r| row_is_consistent(layout, r, num_candidates, offset))
            .count();
        debug!(
            "detect_from_arithmetic: {:?}: {} of {} rows consistent",
            f,
            count,
            rows.len()
        );
        match best {
            Some((_, c)) if c >= count => {}
            _ => best = Some((*f, count)),
        }
    }
    best.map(|(f, _)| f).unwrap_or(DocumentFormat::Simple)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[i64], has_text: bool) -> RawRow {
        RawRow {
            raw_booth_label: "1".to_string(),
            numeric_fields: fields.to_vec(),
            has_text,
            provenance: vec![],
        }
    }

    fn normalized(fields: &[&[i64]]) -> Vec<Vec<Option<i64>>> {
        fields
            .iter()
            .map(|f| f.iter().map(|v| Some(*v)).collect())
            .collect()
    }

    #[test]
    fn address_rows_are_right_anchored() {
        let layout = DocumentFormat::AddressColumn.layout();
        let r = row(&[12, 10, 20, 30, 1, 31], true);
        assert_eq!(
            layout.normalize(&r, 5),
            vec![Some(10), Some(20), Some(30), Some(1), Some(31)]
        );
        let short = row(&[20, 30, 1, 31], true);
        assert_eq!(
            layout.normalize(&short, 5),
            vec![None, Some(20), Some(30), Some(1), Some(31)]
        );
    }

    #[test]
    fn simple_rows_are_left_anchored() {
        let layout = DocumentFormat::Simple.layout();
        let r = row(&[10, 20], false);
        assert_eq!(layout.normalize(&r, 3), vec![Some(10), Some(20), None]);
    }

    #[test]
    fn arithmetic_detection() {
        let formats = [
            DocumentFormat::Simple,
            DocumentFormat::NotaBeforeTotal,
            DocumentFormat::NotaAfterTotal,
        ];
        // Two candidates, then NOTA, TotalValid, Rejected, Total.
        let before = normalized(&[&[10, 20, 3, 33, 1, 34], &[5, 5, 1, 11, 0, 11]]);
        assert_eq!(
            detect_from_arithmetic(&before, 2, 0, &formats),
            DocumentFormat::NotaBeforeTotal
        );
        // TotalValid, Rejected, NOTA, Total.
        let after = normalized(&[&[10, 20, 30, 1, 3, 34], &[5, 5, 10, 0, 1, 11]]);
        assert_eq!(
            detect_from_arithmetic(&after, 2, 0, &formats),
            DocumentFormat::NotaAfterTotal
        );
        let simple = normalized(&[&[10, 20, 30, 1, 31], &[5, 5, 10, 0, 10]]);
        assert_eq!(
            detect_from_arithmetic(&simple, 2, 0, &formats),
            DocumentFormat::Simple
        );
    }

    #[test]
    fn widths() {
        let m = RawMatrix {
            rows: vec![
                row(&[1, 2, 3], true),
                row(&[1, 2, 3], true),
                row(&[9, 1, 2, 3], false),
            ],
        };
        assert_eq!(modal_width(&m), 3);
        assert_eq!(m.width(), 4);
        assert!(has_address_column(&m));
    }
}
