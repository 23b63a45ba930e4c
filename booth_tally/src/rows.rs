//! Detection of booth rows in the text of a result document.
//!
//! The same detector is used for the text layer of a PDF and for the output
//! of the OCR engine: both are sequences of pages made of lines.

use log::debug;

use crate::booth::BoothNumber;
use crate::config::*;

// Words of the summary rows. A line with one of them never continues a row.
const SUMMARY_TOKENS: [&str; 7] = [
    "VALID",
    "REJECTED",
    "NOTA",
    "TENDERED",
    "TOTAL",
    "POSTAL",
    "ELECTORS",
];

// Words of the table headers. They also occur in polling station addresses
// ("Railway Station"), so they only mark a header on a line that cannot
// continue the open row.
const HEADER_TOKENS: [&str; 9] = [
    "POLLING",
    "STATION",
    "SERIAL",
    "SL.NO",
    "S.NO",
    "CANDIDATE",
    "FORM",
    "CONSTITUENCY",
    "RESULT",
];

// Column numbering rows (1 2 3 4 ...) have at least this many fields.
const MIN_NUMBERING_FIELDS: usize = 4;

#[derive(Eq, PartialEq, Debug, Clone)]
enum Token {
    Number(i64),
    Text(String),
}

/// Parses a vote count as printed: `1234`, `1,234` or `-12`.
pub fn parse_vote_token(token: &str) -> Option<i64> {
    let t = token.trim();
    let (negative, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t),
    };
    if body.is_empty() || !body.chars().next()?.is_ascii_digit() {
        return None;
    }
    if !body.chars().all(|c| c.is_ascii_digit() || c == ',') {
        return None;
    }
    // Thousands separators must separate groups of digits.
    if body.ends_with(',') || body.contains(",,") {
        return None;
    }
    let digits: String = body.chars().filter(|c| *c != ',').collect();
    let v: i64 = digits.parse().ok()?;
    Some(if negative { -v } else { v })
}

fn tokenize(line: &str) -> Vec<Token> {
    line.split_whitespace()
        .map(|s| match parse_vote_token(s) {
            Some(n) => Token::Number(n),
            None => Token::Text(s.to_string()),
        })
        .collect()
}

fn is_suffix_token(s: &str) -> bool {
    let inner = s
        .strip_prefix('(')
        .and_then(|x| x.strip_suffix(')'))
        .or_else(|| s.strip_prefix('-'));
    match inner {
        Some(x) => !x.is_empty() && x.len() <= 3 && x.chars().all(|c| c.is_ascii_alphabetic()),
        None => false,
    }
}

/// Finds the booth label at the start of a line.
///
/// Returns the parsed label and the number of raw tokens it spans: the suffix
/// of `37 (W)` is a separate whitespace token.
fn leading_label(raw_tokens: &[&str]) -> Option<(String, usize)> {
    let first = *raw_tokens.first()?;
    if let Some(second) = raw_tokens.get(1) {
        if is_suffix_token(second) && first.chars().all(|c| c.is_ascii_digit()) {
            let joined = format!("{} {}", first, second);
            if BoothNumber::parse(&joined).is_some() {
                return Some((joined, 2));
            }
        }
    }
    if first.contains(',') {
        // A vote count with a thousands separator, never a booth label.
        return None;
    }
    BoothNumber::parse(first).map(|_| (first.to_string(), 1))
}

fn has_word(line: &str, words: &[&str]) -> bool {
    line.split_whitespace().any(|w| {
        let w = w
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_uppercase();
        words.contains(&w.as_str())
    })
}

/// Whole-word match: `Platform` is not a header.
fn is_header_text(line: &str, continues_row: bool) -> bool {
    has_word(line, &SUMMARY_TOKENS) || (!continues_row && has_word(line, &HEADER_TOKENS))
}

/// Rows that number the columns of the table: `1 2 3 4 5 ...`.
fn is_column_numbering(tokens: &[Token]) -> bool {
    if tokens.len() < MIN_NUMBERING_FIELDS {
        return false;
    }
    let mut prev: Option<i64> = None;
    for t in tokens.iter() {
        match (t, prev) {
            (Token::Number(n), None) if *n == 0 || *n == 1 => prev = Some(*n),
            (Token::Number(n), Some(p)) if *n == p + 1 => prev = Some(*n),
            _ => return false,
        }
    }
    true
}

/// Detects the booth rows in a sequence of pages.
///
/// A line opens a new row when it starts with a booth label. A line that
/// carries numbers without a label continues the previous row (the table
/// wrapped). Header and summary lines close the current row so that numbers
/// below them are never merged into the booth above.
pub fn detect_rows(pages: &[String], thresholds: &Thresholds) -> RawMatrix {
    let mut rows: Vec<RawRow> = Vec::new();

    for (page_idx, page) in pages.iter().enumerate() {
        // A page break always closes the current row.
        let mut row_open = false;
        for (line_idx, line) in page.lines().enumerate() {
            let provenance = Provenance {
                page: (page_idx + 1) as u32,
                line: (line_idx + 1) as u32,
            };
            let raw_tokens: Vec<&str> = line.split_whitespace().collect();
            if raw_tokens.is_empty() {
                continue;
            }
            let tokens = tokenize(line);
            if is_column_numbering(&tokens) {
                debug!("detect_rows: {:?}: column numbering row", provenance);
                row_open = false;
                continue;
            }

            if let Some((label, span)) = leading_label(&raw_tokens) {
                let rest = tokenize(&raw_tokens[span..].join(" "));
                let numeric_fields: Vec<i64> = rest
                    .iter()
                    .filter_map(|t| match t {
                        Token::Number(n) => Some(*n),
                        Token::Text(_) => None,
                    })
                    .collect();
                let has_text = rest.iter().any(|t| matches!(t, Token::Text(_)));
                if numeric_fields.is_empty() && !has_text {
                    // A lone number: a page number or a stray serial.
                    row_open = false;
                    continue;
                }
                rows.push(RawRow {
                    raw_booth_label: label,
                    numeric_fields,
                    has_text,
                    provenance: vec![provenance],
                });
                row_open = true;
                continue;
            }

            let numbers: Vec<i64> = tokens
                .iter()
                .filter_map(|t| match t {
                    Token::Number(n) => Some(*n),
                    Token::Text(_) => None,
                })
                .collect();
            if is_header_text(line, row_open && !numbers.is_empty()) {
                debug!("detect_rows: {:?}: header line {:?}", provenance, line);
                row_open = false;
                continue;
            }
            if numbers.is_empty() {
                // Wrapped address text.
                continue;
            }
            match rows.last_mut() {
                Some(row) if row_open => {
                    debug!(
                        "detect_rows: {:?}: continuation of booth {:?}",
                        provenance, row.raw_booth_label
                    );
                    row.numeric_fields.extend(numbers);
                    row.provenance.push(provenance);
                }
                _ => {
                    debug!("detect_rows: {:?}: orphan numbers dropped", provenance);
                }
            }
        }
    }

    let before = rows.len();
    rows.retain(|r| r.numeric_fields.len() >= thresholds.min_numeric_fields);
    if rows.len() < before {
        debug!(
            "detect_rows: dropped {} rows with fewer than {} numeric fields",
            before - rows.len(),
            thresholds.min_numeric_fields
        );
    }
    RawMatrix { rows }
}

/// The share of rows that have the most common number of fields.
pub fn consistent_row_share(matrix: &RawMatrix) -> f64 {
    if matrix.rows.is_empty() {
        return 0.0;
    }
    let mut counts: std::collections::BTreeMap<usize, usize> = std::collections::BTreeMap::new();
    for r in matrix.rows.iter() {
        *counts.entry(r.numeric_fields.len()).or_insert(0) += 1;
    }
    let modal = counts.values().cloned().max().unwrap_or(0);
    modal as f64 / matrix.rows.len() as f64
}
