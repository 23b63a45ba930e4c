use log::{debug, info, warn};

use booth_tally::extract::{AttemptPlan, PageSource};
use booth_tally::schema::{Context, EntityKind, Observation, SchemaError, SchemaIndex};
use booth_tally::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use text_diff::print_diff;

use crate::args::Args;
use crate::ingest::config_reader::*;
use crate::ingest::io_common::simplify_file_name;
use crate::ingest::io_pdf::*;
use crate::ingest::io_reference::*;
use crate::ingest::io_schema::*;
use crate::ingest::output::*;

pub mod config_reader;
pub mod io_common;
pub mod io_pdf;
pub mod io_reference;
pub mod io_schema;
pub mod output;

#[derive(Debug, Snafu)]
pub enum IngestError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing {what}"))]
    SerializingJson {
        source: serde_json::Error,
        what: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet {sheet:?} in {path}"))]
    EmptyExcel { path: String, sheet: String },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error reading document {path}"))]
    OpeningDocument {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid official results in {path}: {source}"))]
    InvalidReference {
        source: ReferenceError,
        path: String,
    },
    #[snafu(display("Invalid schema {path}: {source}"))]
    InvalidSchema { source: SchemaError, path: String },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("Error starting the worker pool"))]
    ThreadPool { source: rayon::ThreadPoolBuildError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type IngestResult<T> = Result<T, IngestError>;

/// One configured document with its checked official results.
#[derive(Debug, Clone)]
struct Job {
    source: DocumentSource,
    provider: Provider,
    document_path: PathBuf,
    reference: Reference,
    // The constituency name given by the reference file, if any.
    reference_ac_name: Option<String>,
    key: ConstituencyKey,
}

impl Job {
    fn input(&self) -> ConstituencyInput<'_> {
        ConstituencyInput {
            raw_ac: &self.source.ac,
            raw_state: &self.source.state,
            year: self.source.year,
            reference: &self.reference,
        }
    }
}

#[derive(Debug, Clone)]
struct RunSettings {
    thresholds: Thresholds,
    ocr: OcrRules,
}

/// Reads every reference up front: a bad reference file stops the run before
/// any document is processed.
fn prepare_jobs(root: &Path, config: &RunConfig, index: &SchemaIndex) -> IngestResult<Vec<Job>> {
    let mut jobs: Vec<Job> = Vec::new();
    for s in config.document_sources.iter() {
        let loaded = read_reference(root, s)?;
        let key = constituency_key(&s.state, &s.ac, s.year, index);
        debug!("prepare_jobs: {} {} -> {:?}", s.ac, s.year, key);
        jobs.push(Job {
            source: s.clone(),
            provider: s.provider()?,
            document_path: root.join(&s.file_path),
            reference: loaded.reference,
            reference_ac_name: loaded.ac_name,
            key,
        });
    }
    Ok(jobs)
}

fn run_job(job: &Job, index: &SchemaIndex, settings: &RunSettings) -> ConstituencyOutcome {
    let input = job.input();
    let plan = match job.provider {
        Provider::Pdf => AttemptPlan::with_ocr_fallback(&settings.ocr.plan),
        Provider::Ocr => AttemptPlan::ocr_only(&settings.ocr.plan),
        Provider::Text => AttemptPlan::text_only(),
    };
    let source: Box<dyn PageSource> = match job.provider {
        Provider::Pdf => Box::new(PdfSource::new(&job.document_path, &settings.ocr, false)),
        Provider::Ocr => Box::new(PdfSource::new(&job.document_path, &settings.ocr, true)),
        Provider::Text => Box::new(TextFileSource::new(&job.document_path)),
    };
    process_constituency(&input, source.as_ref(), &plan, index, &settings.thresholds)
}

fn panic_message(e: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = e.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = e.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A job that panics is run a second time. A second panic gives an EMPTY
/// outcome that records the crash.
fn run_guarded(job: &Job, index: &SchemaIndex, settings: &RunSettings) -> ConstituencyOutcome {
    let mut detail = String::new();
    for attempt in 1..=2 {
        match panic::catch_unwind(AssertUnwindSafe(|| run_job(job, index, settings))) {
            Ok(outcome) => return outcome,
            Err(e) => {
                detail = panic_message(e.as_ref());
                warn!(
                    "run_guarded: {} {} crashed (attempt {}): {}",
                    job.source.ac, job.source.year, attempt, detail
                );
            }
        }
    }
    crashed_constituency(&job.input(), index, &format!("crashed twice: {}", detail))
}

fn needs_run(job: &Job, outputs: &BTreeMap<(String, u32), StateYearOutput>) -> bool {
    let rec = outputs
        .get(&(job.key.state_key.clone(), job.source.year))
        .and_then(|o| o.constituencies.get(&job.key.ac_key));
    match rec.map(|r| QualityTier::parse(&r.quality)) {
        Some(Some(t)) => matches!(
            t,
            QualityTier::Empty | QualityTier::NeedsReview | QualityTier::Poor
        ),
        _ => true,
    }
}

fn select_jobs<'a>(
    jobs: &'a [Job],
    args: &Args,
    index: &SchemaIndex,
    outputs: &BTreeMap<(String, u32), StateYearOutput>,
) -> IngestResult<Vec<&'a Job>> {
    if let Some(ac) = &args.ac {
        let wanted = ac.trim();
        let res: Vec<&Job> = jobs
            .iter()
            .filter(|j| {
                if j.source.ac.trim().eq_ignore_ascii_case(wanted) || j.key.ac_key == wanted {
                    return true;
                }
                let state = if j.key.state_resolved {
                    Some(j.key.state_key.as_str())
                } else {
                    None
                };
                index
                    .resolve(wanted, &Context::ac(state, Some(j.source.year)))
                    .map_or(false, |r| r.id == j.key.ac_key)
            })
            .collect();
        if res.is_empty() {
            whatever!("no configured constituency matches {:?}", ac)
        }
        return Ok(res);
    }
    if args.batch {
        let res: Vec<&Job> = jobs
            .iter()
            .filter(|j| args.force || needs_run(j, outputs))
            .collect();
        info!(
            "select_jobs: {} of {} constituencies to process",
            res.len(),
            jobs.len()
        );
        return Ok(res);
    }
    whatever!("either --ac or --batch is required")
}

/// Adds the aliases found through inferred matches to the schema and writes
/// the new schema.
fn discover_aliases(jobs: &[Job], index: &SchemaIndex, out: &Path) -> IngestResult<usize> {
    let mut observations: Vec<Observation> = Vec::new();
    for job in jobs.iter() {
        let year = Some(job.source.year);
        observations.push(Observation {
            raw_name: job.source.state.clone(),
            context: Context::state(year),
        });
        let state = if job.key.state_resolved {
            Some(job.key.state_key.as_str())
        } else {
            None
        };
        let ac_context = Context::ac(state, year);
        observations.push(Observation {
            raw_name: job.source.ac.clone(),
            context: ac_context.clone(),
        });
        if let Some(name) = &job.reference_ac_name {
            observations.push(Observation {
                raw_name: name.clone(),
                context: ac_context,
            });
        }
        for c in job.reference.candidates.iter() {
            observations.push(Observation {
                raw_name: c.party.clone(),
                context: Context::party(year),
            });
        }
    }
    let aliases = index.discover_aliases(&observations);
    for a in aliases.iter() {
        info!(
            "discover_aliases: {:?} -> {} ({})",
            a.alias,
            a.id,
            a.strategy.as_str()
        );
    }
    let updated = index.with_aliases(&aliases).context(InvalidSchemaSnafu {
        path: out.display().to_string(),
    })?;
    write_schema(out, &updated)?;
    Ok(aliases.len())
}

/// Deletes the records of constituencies that the schema does not know for
/// their year. Records under a raw key are kept.
fn remove_invalid(
    outputs: &mut BTreeMap<(String, u32), StateYearOutput>,
    index: &SchemaIndex,
    out_dir: &Path,
) -> IngestResult<usize> {
    let mut removed = 0;
    for ((state, year), o) in outputs.iter_mut() {
        let before = o.constituencies.len();
        o.constituencies.retain(|key, rec| {
            if rec.unmatched_key {
                return true;
            }
            let keep = index
                .entity(key)
                .map_or(false, |e| e.kind == EntityKind::Ac && e.is_valid_for(*year));
            if !keep {
                info!("remove_invalid: {} does not exist in {}", key, year);
            }
            keep
        });
        let n = before - o.constituencies.len();
        if n == 0 {
            continue;
        }
        removed += n;
        if o.constituencies.is_empty() {
            let p = out_dir.join(output_file_name(state, *year));
            fs::remove_file(&p).context(WritingOutputSnafu {
                path: p.display().to_string(),
            })?;
            info!("remove_invalid: deleted {}", p.display());
        } else {
            write_output(out_dir, o)?;
        }
    }
    Ok(removed)
}

fn check_reference(
    path: &str,
    outputs: &BTreeMap<(String, u32), StateYearOutput>,
) -> IngestResult<()> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let expected: StateYearOutput =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    let actual = match outputs.get(&(expected.state.clone(), expected.year)) {
        Some(o) => o,
        None => whatever!("no output for {} {}", expected.state, expected.year),
    };
    let pretty_expected =
        serde_json::to_string_pretty(&expected).context(SerializingJsonSnafu { what: path })?;
    let pretty_actual =
        serde_json::to_string_pretty(actual).context(SerializingJsonSnafu { what: path })?;
    if pretty_expected != pretty_actual {
        warn!("Found differences with the reference output");
        print_diff(pretty_expected.as_str(), pretty_actual.as_str(), "\n");
        whatever!(
            "Difference detected between the output for {} {} and the reference {}",
            expected.state,
            expected.year,
            path
        )
    }
    Ok(())
}

/// Runs one invocation of the program and returns its exit code.
pub fn run(args: &Args) -> IngestResult<i32> {
    let config = read_config(&args.config)?;
    info!("config: {:?}", config);
    if config.document_sources.is_empty() {
        whatever!("no document sources in {}", args.config)
    }
    let root = Path::new(&args.config)
        .parent()
        .context(MissingParentDirSnafu {})?;

    let settings = RunSettings {
        thresholds: config
            .thresholds
            .clone()
            .unwrap_or_default()
            .to_thresholds()?,
        ocr: config.ocr.clone().unwrap_or_default().to_rules()?,
    };
    let index = read_schema(&root.join(&config.schema_path), &settings.thresholds)?;
    let jobs = prepare_jobs(root, &config, &index)?;

    if let Some(out) = &args.discover_aliases {
        let n = discover_aliases(&jobs, &index, Path::new(out))?;
        info!("run: {} new aliases written to {}", n, out);
        return Ok(EXIT_OK);
    }

    let out_dir: PathBuf = match (&args.out, &config.output_settings.output_directory) {
        (Some(o), _) => PathBuf::from(o),
        (None, Some(o)) => root.join(o),
        (None, None) => root.join("output"),
    };
    let mut outputs = read_outputs(&out_dir)?;

    if args.remove_invalid {
        let n = remove_invalid(&mut outputs, &index, &out_dir)?;
        info!("run: removed {} constituency records", n);
        return Ok(EXIT_OK);
    }

    let selected = select_jobs(&jobs, args, &index, &outputs)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.workers.or(config.workers).unwrap_or(0))
        .build()
        .context(ThreadPoolSnafu {})?;
    let outcomes: Vec<ConstituencyOutcome> = pool.install(|| {
        selected
            .par_iter()
            .map(|job| run_guarded(job, &index, &settings))
            .collect()
    });

    let mut touched: BTreeSet<(String, u32)> = BTreeSet::new();
    let mut processed: Vec<(String, u32, String)> = Vec::new();
    let mut tiers: Vec<QualityTier> = Vec::new();
    for (job, outcome) in selected.iter().zip(outcomes.iter()) {
        let extraction = ExtractionRecord {
            provider: job.source.provider.clone(),
            file: job.source.file_path.clone(),
            sha256: document_digest(&job.document_path).ok(),
            attempt: None,
            attempts: 0,
        };
        let rec = ac_record(outcome, &job.reference, &job.source.ac, extraction);
        let key = (outcome.state_key.clone(), outcome.year);
        outputs
            .entry(key.clone())
            .or_insert_with(|| StateYearOutput::new(&key.0, key.1))
            .constituencies
            .insert(outcome.ac_key.clone(), rec);
        debug!(
            "run: {} ({}) -> {}",
            outcome.ac_key,
            simplify_file_name(&job.document_path),
            outcome.tier.as_str()
        );
        processed.push((key.0.clone(), key.1, outcome.ac_key.clone()));
        tiers.push(outcome.tier);
        touched.insert(key);
    }
    for key in touched.iter() {
        if let Some(o) = outputs.get(key) {
            write_output(&out_dir, o)?;
        }
    }

    let max_needs_review = args
        .max_needs_review
        .or(config.output_settings.max_needs_review)
        .unwrap_or(0);
    let code = exit_code(&tiers, max_needs_review);
    let records: Vec<(String, u32, String, &AcRecord)> = processed
        .iter()
        .filter_map(|(s, y, ac)| {
            outputs
                .get(&(s.clone(), *y))
                .and_then(|o| o.constituencies.get(ac))
                .map(|r| (s.clone(), *y, ac.clone(), r))
        })
        .collect();
    let report = validation_report(&records, code);
    let report_path = write_report(&out_dir, &report)?;
    info!(
        "run: {} constituencies processed, {:?}, report in {}",
        report.processed,
        report.tiers,
        report_path.display()
    );

    if let Some(r) = &args.reference {
        check_reference(r, &outputs)?;
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const SCHEMA: &str = r#"{
      "entities": [
        {"id": "TS", "kind": "state", "name": "Telangana"},
        {"id": "AP", "kind": "state", "name": "Andhra Pradesh"},
        {"id": "TS-085", "kind": "ac", "name": "Achampet (SC)", "state": "TS",
         "sequence": 85},
        {"id": "TS-012", "kind": "ac", "name": "Old Town", "state": "TS",
         "sequence": 12, "validTo": 2014},
        {"id": "INC", "kind": "party", "name": "Indian National Congress",
         "aliases": ["INC"]},
        {"id": "BRS", "kind": "party", "name": "Bharat Rashtra Samithi"}
      ]
    }"#;

    const DOCUMENT: &str = "\
FORM 20
Serial No. of Polling Station   A   B   C   NOTA  Total Valid  Rejected  Total
1       120   80   10   2   212   1   213
2       100   90   20   3   213   0   213
37(W)   50    60   5    1   116   2   118
\x0c
3       70    40   15   0   125   1   126
";

    const REFERENCE: &str = "\
name,party,officialVotes
Anna,INC,340
Bala,Bharat Rashtra Samithi,270
Chitra,IND,50
NOTA,NOTA,6
";

    fn source(ac: &str, file: &str) -> String {
        format!(
            r#"{{"provider": "text", "filePath": "{}", "ac": "{}", "state": "Telangana",
                 "year": 2018, "referencePath": "reference.csv",
                 "expectedBooths": 4, "electors": 800}}"#,
            file, ac
        )
    }

    // Writes a run directory and returns the path of its configuration.
    fn setup(dir: &Path, sources: &[String]) -> PathBuf {
        fs::write(dir.join("schema.json"), SCHEMA).unwrap();
        fs::write(dir.join("achampet.txt"), DOCUMENT).unwrap();
        fs::write(dir.join("blank.txt"), "FORM 20\n\nno table here\n").unwrap();
        fs::write(dir.join("reference.csv"), REFERENCE).unwrap();
        let config = format!(
            r#"{{"outputSettings": {{"outputDirectory": "out"}},
                 "schemaPath": "schema.json",
                 "workers": 2,
                 "documentSources": [{}]}}"#,
            sources.join(",")
        );
        let p = dir.join("config.json");
        fs::write(&p, config).unwrap();
        p
    }

    fn args(config: &Path) -> Args {
        Args {
            config: config.display().to_string(),
            ac: None,
            batch: false,
            force: false,
            out: None,
            reference: None,
            workers: None,
            discover_aliases: None,
            remove_invalid: false,
            max_needs_review: None,
            verbose: false,
        }
    }

    fn batch(config: &Path) -> Args {
        Args {
            batch: true,
            ..args(config)
        }
    }

    fn output(dir: &Path) -> String {
        fs::read_to_string(dir.join("out").join("TS_2018.json")).unwrap()
    }

    fn report(dir: &Path) -> ValidationReport {
        let s = fs::read_to_string(dir.join("out").join(REPORT_FILE)).unwrap();
        serde_json::from_str(&s).unwrap()
    }

    #[test]
    fn batch_runs_are_idempotent() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), &[source("85 - Achampet", "achampet.txt")]);

        assert_eq!(run(&batch(&config)).unwrap(), EXIT_OK);
        let first = output(dir.path());
        let o: StateYearOutput = serde_json::from_str(&first).unwrap();
        let rec = &o.constituencies["TS-085"];
        assert_eq!(rec.quality, "EXCELLENT");
        assert_eq!(rec.match_strategy.as_deref(), Some("sequenceNumber"));
        assert_eq!(rec.result.valid_votes, 660);
        assert_eq!(rec.booths.len(), 4);
        assert!(rec.booths.contains_key("TS-085-37W"));
        assert_eq!(rec.extraction.attempts, 1);
        assert!(rec.extraction.sha256.is_some());
        assert_eq!(report(dir.path()).processed, 1);

        // Already EXCELLENT: nothing to do without --force.
        assert_eq!(run(&batch(&config)).unwrap(), EXIT_OK);
        assert_eq!(report(dir.path()).processed, 0);

        let forced = Args {
            force: true,
            ..batch(&config)
        };
        assert_eq!(run(&forced).unwrap(), EXIT_OK);
        assert_eq!(report(dir.path()).processed, 1);
        assert_eq!(output(dir.path()), first);
    }

    #[test]
    fn exit_codes_follow_tiers() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let config = setup(
            dir.path(),
            &[
                source("85 - Achampet", "achampet.txt"),
                source("Atlantis", "achampet.txt"),
            ],
        );
        assert_eq!(run(&batch(&config)).unwrap(), EXIT_NEEDS_REVIEW);
        let o: StateYearOutput = serde_json::from_str(&output(dir.path())).unwrap();
        assert!(o.constituencies["Atlantis"].unmatched_key);
        assert!(!o.constituencies["TS-085"].unmatched_key);
        let r = report(dir.path());
        assert_eq!(r.tiers["NEEDS_REVIEW"], 1);
        assert_eq!(r.exit_code, EXIT_NEEDS_REVIEW);

        // One NEEDS_REVIEW is tolerated.
        let tolerant = Args {
            max_needs_review: Some(1),
            ..batch(&config)
        };
        assert_eq!(run(&tolerant).unwrap(), EXIT_OK);
    }

    #[test]
    fn blank_document_is_empty() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), &[source("TS-085", "blank.txt")]);
        assert_eq!(run(&batch(&config)).unwrap(), EXIT_EMPTY);
        let o: StateYearOutput = serde_json::from_str(&output(dir.path())).unwrap();
        let rec = &o.constituencies["TS-085"];
        assert_eq!(rec.quality, "EMPTY");
        assert_eq!(rec.result.votes_source, "reference");
        assert!(rec.issues.iter().any(|i| i.code == "EXTRACTION_FAILURE"));
        assert_eq!(report(dir.path()).flagged.len(), 1);
    }

    #[test]
    fn single_constituency() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let config = setup(
            dir.path(),
            &[
                source("85 - Achampet", "achampet.txt"),
                source("Atlantis", "achampet.txt"),
            ],
        );
        let one = Args {
            ac: Some("Achampet".to_string()),
            ..args(&config)
        };
        assert_eq!(run(&one).unwrap(), EXIT_OK);
        let o: StateYearOutput = serde_json::from_str(&output(dir.path())).unwrap();
        let keys: Vec<&String> = o.constituencies.keys().collect();
        assert_eq!(keys, vec!["TS-085"]);

        let unknown = Args {
            ac: Some("TS-200".to_string()),
            ..args(&config)
        };
        assert!(run(&unknown).is_err());
        // Neither --ac nor --batch.
        assert!(run(&args(&config)).is_err());
    }

    #[test]
    fn reference_output_check() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), &[source("85 - Achampet", "achampet.txt")]);
        assert_eq!(run(&batch(&config)).unwrap(), EXIT_OK);

        let good = dir.path().join("expected.json");
        fs::write(&good, output(dir.path())).unwrap();
        let check = Args {
            force: true,
            reference: Some(good.display().to_string()),
            ..batch(&config)
        };
        assert_eq!(run(&check).unwrap(), EXIT_OK);

        let mut o: StateYearOutput = serde_json::from_str(&output(dir.path())).unwrap();
        if let Some(rec) = o.constituencies.get_mut("TS-085") {
            rec.result.valid_votes += 1;
        }
        let bad = dir.path().join("altered.json");
        fs::write(&bad, serde_json::to_string_pretty(&o).unwrap()).unwrap();
        let check = Args {
            force: true,
            reference: Some(bad.display().to_string()),
            ..batch(&config)
        };
        assert!(run(&check).is_err());
    }

    #[test]
    fn invalid_records_are_removed() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let config = setup(
            dir.path(),
            &[
                source("85 - Achampet", "achampet.txt"),
                source("Atlantis", "achampet.txt"),
            ],
        );
        run(&batch(&config)).unwrap();

        let out_dir = dir.path().join("out");
        let mut outputs = read_outputs(&out_dir).unwrap();
        let ts = outputs.get_mut(&("TS".to_string(), 2018)).unwrap();
        let rec = ts.constituencies["TS-085"].clone();
        // Abolished after 2014.
        ts.constituencies.insert("TS-012".to_string(), rec.clone());
        write_output(&out_dir, ts).unwrap();
        let mut ap = StateYearOutput::new("AP", 2019);
        ap.constituencies.insert("AP-404".to_string(), rec);
        write_output(&out_dir, &ap).unwrap();

        let remove = Args {
            remove_invalid: true,
            ..args(&config)
        };
        assert_eq!(run(&remove).unwrap(), EXIT_OK);
        let outputs = read_outputs(&out_dir).unwrap();
        let keys: Vec<&String> = outputs[&("TS".to_string(), 2018)]
            .constituencies
            .keys()
            .collect();
        assert_eq!(keys, vec!["Atlantis", "TS-085"]);
        assert!(!out_dir.join("AP_2019.json").exists());
    }

    #[test]
    fn aliases_are_discovered() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), &[source("85 - Achampet", "achampet.txt")]);
        let schema_out = dir.path().join("schema2.json");
        let discover = Args {
            discover_aliases: Some(schema_out.display().to_string()),
            ..args(&config)
        };
        assert_eq!(run(&discover).unwrap(), EXIT_OK);
        let index = read_schema(&schema_out, &Thresholds::DEFAULT).unwrap();
        let ac = index.entity("TS-085").unwrap();
        assert_eq!(ac.aliases, vec!["85 - Achampet".to_string()]);
        let r = index
            .resolve("85 - Achampet", &Context::ac(Some("TS"), Some(2018)))
            .unwrap();
        assert_eq!(r.strategy.as_str(), "alias");
        // Nothing is processed.
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn bad_reference_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), &[source("85 - Achampet", "achampet.txt")]);
        fs::write(dir.path().join("reference.csv"), "name,party,officialVotes\n").unwrap();
        let e = run(&batch(&config)).unwrap_err();
        assert!(matches!(e, IngestError::InvalidReference { .. }));
    }
}
