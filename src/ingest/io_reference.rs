// Readers for the official results of a constituency.

use crate::ingest::*;

use booth_tally::builder::ReferenceBuilder;
use calamine::{open_workbook, DataType, Reader, Xlsx};
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCandidateFile {
    pub name: String,
    pub party: String,
    #[serde(rename = "officialVotes")]
    pub official_votes: u64,
}

/// The JSON form of the official results.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFile {
    #[serde(rename = "acName")]
    pub ac_name: Option<String>,
    pub state: Option<String>,
    pub year: Option<u32>,
    #[serde(rename = "expectedBooths")]
    pub expected_booths: Option<u32>,
    pub electors: Option<u64>,
    #[serde(rename = "officialNota")]
    pub official_nota: Option<u64>,
    #[serde(rename = "officialRejected")]
    pub official_rejected: Option<u64>,
    pub candidates: Vec<ReferenceCandidateFile>,
}

/// A checked reference, with the constituency name that the file gives
/// (used by alias discovery).
#[derive(PartialEq, Debug, Clone)]
pub struct LoadedReference {
    pub reference: Reference,
    pub ac_name: Option<String>,
}

fn is_nota(c: &ReferenceCandidateFile) -> bool {
    let n = |s: &str| {
        let s = s.trim().to_lowercase();
        s == "nota" || s == "none of the above"
    };
    n(&c.name) || n(&c.party)
}

/// Builds the reference. NOTA rows become the official NOTA count, and the
/// fields of the source override the ones of the file.
fn assemble(file: ReferenceFile, source: &DocumentSource, path: &str) -> IngestResult<LoadedReference> {
    let mut b = ReferenceBuilder::new();
    let mut nota: Option<u64> = file.official_nota;
    for c in file.candidates.iter() {
        if is_nota(c) {
            nota = Some(nota.unwrap_or(0).max(c.official_votes));
            continue;
        }
        b = b
            .candidate(&c.name, &c.party, c.official_votes)
            .context(InvalidReferenceSnafu { path })?;
    }
    if let Some(x) = source.official_nota.or(nota) {
        b = b.nota(x);
    }
    if let Some(x) = source.official_rejected.or(file.official_rejected) {
        b = b.rejected(x);
    }
    if let Some(x) = source.expected_booths.or(file.expected_booths) {
        b = b.expected_booths(x);
    }
    if let Some(x) = source.electors.or(file.electors) {
        b = b.electors(x);
    }
    let reference = b.build().context(InvalidReferenceSnafu { path })?;
    debug!(
        "read_reference: {}: {} candidates, valid {}",
        path,
        reference.candidates.len(),
        reference.official_valid()
    );
    Ok(LoadedReference {
        reference,
        ac_name: file.ac_name,
    })
}

fn empty_file(candidates: Vec<ReferenceCandidateFile>) -> ReferenceFile {
    ReferenceFile {
        ac_name: None,
        state: None,
        year: None,
        expected_booths: None,
        electors: None,
        official_nota: None,
        official_rejected: None,
        candidates,
    }
}

fn read_json(path: &str) -> IngestResult<ReferenceFile> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
}

fn read_csv(path: &str) -> IngestResult<ReferenceFile> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut candidates: Vec<ReferenceCandidateFile> = Vec::new();
    for (idx, row) in rdr.deserialize::<ReferenceCandidateFile>().enumerate() {
        // The header is line 1.
        let c = row.context(CsvLineParseSnafu {
            path,
            lineno: idx + 2,
        })?;
        candidates.push(c);
    }
    Ok(empty_file(candidates))
}

fn cell_string(c: Option<&DataType>) -> Option<String> {
    match c {
        Some(DataType::String(s)) => Some(s.trim().to_string()),
        Some(DataType::Int(x)) => Some(x.to_string()),
        Some(DataType::Float(x)) => Some(x.to_string()),
        _ => None,
    }
}

fn cell_votes(c: Option<&DataType>) -> Option<u64> {
    match c {
        Some(DataType::Int(x)) if *x >= 0 => Some(*x as u64),
        Some(DataType::Float(x)) if *x >= 0.0 && x.fract() == 0.0 => Some(*x as u64),
        Some(DataType::String(s)) => s.trim().replace(',', "").parse::<u64>().ok(),
        _ => None,
    }
}

fn read_xlsx(path: &str, worksheet: &Option<String>) -> IngestResult<ReferenceFile> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let sheet = worksheet.clone().unwrap_or_default();
    let wrange = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(EmptyExcelSnafu { path, sheet: &sheet })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path, sheet: &sheet })?
            .context(OpeningExcelSnafu { path })?,
    };

    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu { path, sheet: &sheet })?;
    let column = |name: &str| {
        header.iter().position(|c| {
            cell_string(Some(c)).map_or(false, |s| s.eq_ignore_ascii_case(name))
        })
    };
    let (name_col, party_col, votes_col) =
        match (column("name"), column("party"), column("officialVotes")) {
            (Some(n), Some(p), Some(v)) => (n, p, v),
            _ => whatever!(
                "{}: the header must have the columns name, party and officialVotes",
                path
            ),
        };

    let mut candidates: Vec<ReferenceCandidateFile> = Vec::new();
    for (idx, row) in rows.enumerate() {
        let name = cell_string(row.get(name_col)).unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let votes = match cell_votes(row.get(votes_col)) {
            Some(v) => v,
            None => whatever!("{}: row {}: no vote count for {}", path, idx + 2, name),
        };
        candidates.push(ReferenceCandidateFile {
            name,
            party: cell_string(row.get(party_col)).unwrap_or_default(),
            official_votes: votes,
        });
    }
    Ok(empty_file(candidates))
}

/// Reads and checks the official results of one document source. The path is
/// relative to the configuration.
pub fn read_reference(root: &Path, source: &DocumentSource) -> IngestResult<LoadedReference> {
    let p = root.join(&source.reference_path);
    let path = p.display().to_string();
    let file = match source.reference_format()? {
        ReferenceFormat::Json => read_json(&path)?,
        ReferenceFormat::Csv => read_csv(&path)?,
        ReferenceFormat::Xlsx => read_xlsx(&path, &source.excel_worksheet_name)?,
    };
    assemble(file, source, &path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(reference_path: &str) -> DocumentSource {
        DocumentSource {
            provider: "text".to_string(),
            file_path: "doc.txt".to_string(),
            ac: "Achampet".to_string(),
            state: "TS".to_string(),
            year: 2018,
            reference_path: reference_path.to_string(),
            reference_format: None,
            excel_worksheet_name: None,
            expected_booths: None,
            electors: None,
            official_nota: None,
            official_rejected: None,
        }
    }

    #[test]
    fn json_reference() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ref.json"),
            r#"{"acName": "85 - Achampet", "expectedBooths": 240, "officialNota": 12,
                "candidates": [
                  {"name": "Anna", "party": "INC", "officialVotes": 340},
                  {"name": "Bala", "party": "BRS", "officialVotes": 270}]}"#,
        )
        .unwrap();
        let mut s = source("ref.json");
        s.expected_booths = Some(250);
        let r = read_reference(dir.path(), &s).unwrap();
        assert_eq!(r.ac_name.as_deref(), Some("85 - Achampet"));
        assert_eq!(r.reference.candidates.len(), 2);
        assert_eq!(r.reference.official_nota, Some(12));
        assert_eq!(r.reference.expected_booths, Some(250));
        assert_eq!(r.reference.official_valid(), 610);
    }

    #[test]
    fn csv_reference_with_nota_row() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ref.csv"),
            "name,party,officialVotes\nAnna, INC ,340\nBala,BRS,270\nNOTA,NOTA,6\n",
        )
        .unwrap();
        let r = read_reference(dir.path(), &source("ref.csv")).unwrap();
        let names: Vec<&str> = r.reference.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Anna", "Bala"]);
        assert_eq!(r.reference.candidates[0].party, "INC");
        assert_eq!(r.reference.official_nota, Some(6));
        assert_eq!(r.ac_name, None);
    }

    #[test]
    fn bad_references() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("dup.csv"),
            "name,party,officialVotes\nAnna,INC,340\nAnna,INC,20\n",
        )
        .unwrap();
        let e = read_reference(dir.path(), &source("dup.csv")).unwrap_err();
        assert!(matches!(e, IngestError::InvalidReference { .. }));

        fs::write(dir.path().join("bad.csv"), "name,party,officialVotes\nAnna,INC,many\n").unwrap();
        let e = read_reference(dir.path(), &source("bad.csv")).unwrap_err();
        assert!(matches!(e, IngestError::CsvLineParse { lineno: 2, .. }));

        assert!(read_reference(dir.path(), &source("missing.json")).is_err());
    }
}
