use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use envcore::algorithm::consensus::{AnnotatedEnvelope, ConsensusEnvelope, ObservedPeak};
use envcore::algorithm::envelope::{build_envelope, TheoreticalIsotope};
use envcore::algorithm::isotope::{IsotopologueEnumerator, IsotopologueSource};
use envcore::chemistry::composition::ElementalComposition;
use envcore::chemistry::composition_table::{CompositionTable, MassQuery};
use envcore::chemistry::constants::{MASS_PROTON, MODIFICATION};
use envcore::chemistry::formula::parse_formula;
use envcore::data::spectrum::SpectrumSource;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;

use crate::config::{FormulaSource, MatchConfig, PrecursorSource};
use crate::errors::{CliError, RowError};
use crate::io::raw_file::RawFile;
use crate::io::peptides::{PeptideRow, PeptideTable, RowOutcome};

/// The sequence with the first `j` modification symbols removed, for `j = 0..=count`.
///
/// # Example
///
/// ```
/// use envmatch::processing::candidate_sequences;
///
/// assert_eq!(candidate_sequences("AR*GR*K"), vec!["AR*GR*K", "ARGR*K", "ARGRK"]);
/// assert_eq!(candidate_sequences("GASP"), vec!["GASP"]);
/// ```
pub fn candidate_sequences(sequence: &str) -> Vec<String> {
    let count = sequence.matches(MODIFICATION).count();
    (0..=count).map(|removed| sequence.replacen(MODIFICATION, "", removed)).collect()
}

/// File name form of a sequence: a modified residue is written in lower case.
///
/// # Example
///
/// ```
/// use envmatch::processing::make_of_seq;
///
/// assert_eq!(make_of_seq("AR*GK").unwrap(), "ArGK");
/// assert!(make_of_seq("*AR").is_err());
/// ```
pub fn make_of_seq(sequence: &str) -> Result<String, RowError> {
    let mut name = String::with_capacity(sequence.len());
    let mut buffer = [0u8; 4];
    for residue in sequence.chars() {
        if residue.encode_utf8(&mut buffer) == MODIFICATION {
            let modified = name.pop().ok_or_else(|| RowError::InvalidSequence(sequence.to_string()))?;
            name.extend(modified.to_lowercase());
        } else {
            name.push(residue);
        }
    }
    Ok(name)
}

/// Envelope of one candidate sequence of a row.
#[derive(Clone, Debug)]
struct Candidate {
    sequence: String,
    envelope: Vec<TheoreticalIsotope>,
    mono_mass: f64,
}

/// Everything computed for one row, kept for envelope dumps.
#[derive(Clone, Debug, Serialize)]
pub struct RowReport {
    pub sequence: String,
    pub charge: i32,
    pub scan: u32,
    pub precursor_scan: u32,
    pub parent_file: String,
    pub best_index: Option<usize>,
    pub env_score: Option<f64>,
    pub good_envelope: bool,
    pub candidates: Vec<AnnotatedEnvelope>,
}

/// Matches peptide rows against their survey scans.
pub struct EnvelopeMatcher<'a, S, I = IsotopologueEnumerator> {
    config: &'a MatchConfig,
    table: &'a CompositionTable,
    spectra: &'a HashMap<String, S>,
    source: I,
}

impl<'a, S: SpectrumSource> EnvelopeMatcher<'a, S> {
    pub fn new(config: &'a MatchConfig, table: &'a CompositionTable, spectra: &'a HashMap<String, S>) -> Self {
        EnvelopeMatcher {
            config,
            table,
            spectra,
            source: IsotopologueEnumerator::default(),
        }
    }
}

impl<'a, S: SpectrumSource, I: IsotopologueSource> EnvelopeMatcher<'a, S, I> {
    pub fn with_source<J: IsotopologueSource>(self, source: J) -> EnvelopeMatcher<'a, S, J> {
        EnvelopeMatcher {
            config: self.config,
            table: self.table,
            spectra: self.spectra,
            source,
        }
    }

    fn composition(&self, row: &PeptideRow, candidate: &str, removed: usize) -> Result<ElementalComposition, RowError> {
        match self.config.formula_source {
            FormulaSource::Calculate => Ok(self.table.get_composition(candidate, row.charge, true, true)?),
            FormulaSource::Input => {
                let formula = row.formula.as_deref().unwrap_or_default();
                let mut composition = parse_formula(formula)?;
                composition.set_charge(row.charge);
                composition -= &self.table.modification_delta(removed)?;
                Ok(composition)
            }
        }
    }

    fn candidate(&self, row: &PeptideRow, sequence: String, removed: usize) -> Result<Candidate, RowError> {
        let composition = self.composition(row, &sequence, removed)?;
        let envelope = build_envelope(&self.source, &composition, &self.config.envelope)?;
        let mono_mass = self.table.get_mass(MassQuery::Composition(&composition), Some(0))?;
        Ok(Candidate {
            sequence,
            envelope,
            mono_mass,
        })
    }

    /// Score every candidate of `row` against its survey scan.
    pub fn score_row(&self, row: &PeptideRow) -> Result<RowReport, RowError> {
        let sequence = row.sequence.to_uppercase();
        let candidates = candidate_sequences(&sequence)
            .into_iter()
            .enumerate()
            .map(|(removed, candidate)| self.candidate(row, candidate, removed))
            .collect::<Result<Vec<_>, _>>()?;

        let spectra = self
            .spectra
            .get(&row.parent_file)
            .ok_or_else(|| RowError::UnknownParentFile(row.parent_file.clone()))?;

        let precursor_scan = match self.config.pre_scan_src {
            PrecursorSource::Input => row.precursor_scan.ok_or_else(|| RowError::PrecursorNotFound {
                scan: row.scan,
                file: row.parent_file.clone(),
            })?,
            PrecursorSource::Ms1 => spectra.precursor_scan(row.scan).ok_or_else(|| RowError::PrecursorNotFound {
                scan: row.scan,
                file: row.parent_file.clone(),
            })?,
        };

        let charge = row.charge.abs().max(1) as f64;
        let mono_mz: Vec<f64> = candidates
            .iter()
            .map(|candidate| (candidate.mono_mass + row.charge as f64 * MASS_PROTON) / charge)
            .collect();
        let lower = mono_mz.iter().copied().fold(f64::INFINITY, f64::min) - self.config.mz_margin;
        let upper = mono_mz.iter().copied().fold(f64::NEG_INFINITY, f64::max) + self.config.mz_margin;

        let spectrum = spectra
            .spectrum(precursor_scan, Some((lower, upper)))
            .ok_or_else(|| RowError::ScanNotFound {
                scan: precursor_scan,
                file: row.parent_file.clone(),
            })?;
        let observed = ObservedPeak::from_spectrum(&spectrum);

        let mut best_score = 0.0;
        let mut best_index = None;
        let mut scores = Vec::with_capacity(candidates.len());
        let mut annotated = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.into_iter().enumerate() {
            let mut consensus = ConsensusEnvelope::new(
                candidate.envelope,
                observed.clone(),
                self.config.tolerance,
                self.config.tie_break,
            )
            .with_sequence(candidate.sequence);

            let score = match consensus.set_mono_mass(candidate.mono_mass, row.charge) {
                Ok(_) => {
                    consensus.annotate(false, true);
                    consensus.score()
                }
                Err(e) => {
                    debug!("Skipping candidate {:?} of scan {}: {}", consensus.sequence(), row.scan, e);
                    None
                }
            };

            if let Some(score) = score {
                if score > best_score {
                    best_score = score;
                    best_index = Some(index);
                }
            }
            scores.push(score);
            annotated.push(consensus.annotated());
        }

        let good_envelope = best_index == Some(0) && best_score >= self.config.env_co;

        Ok(RowReport {
            sequence: row.sequence.clone(),
            charge: row.charge,
            scan: row.scan,
            precursor_scan,
            parent_file: row.parent_file.clone(),
            best_index,
            env_score: scores.first().copied().flatten(),
            good_envelope,
            candidates: annotated,
        })
    }
}

impl<'a, S: SpectrumSource + Sync, I: IsotopologueSource + Sync> EnvelopeMatcher<'a, S, I> {
    /// Match every row of `peptides`, failures of single rows are logged and reported as no match.
    pub fn process(&self, peptides: &PeptideTable) -> Vec<RowOutcome> {
        (0..peptides.len())
            .into_par_iter()
            .map(|index| {
                let report = peptides.row(index).and_then(|row| {
                    let report = self.score_row(&row)?;
                    if self.config.dump_envelopes {
                        self.dump(&row, &report);
                    }
                    Ok(report)
                });
                match report {
                    Ok(report) => RowOutcome {
                        env_score: report.env_score,
                        good_envelope: report.good_envelope,
                    },
                    Err(e) => {
                        warn!("Row {} of {}: {}", index + 1, peptides.path.display(), e);
                        RowOutcome::default()
                    }
                }
            })
            .collect()
    }

    fn dump_path(&self, row: &PeptideRow, report: &RowReport) -> Result<PathBuf, RowError> {
        let mut dir = self.config.dump_dir.clone();
        if self.config.split_dumps {
            dir.push(if report.good_envelope { "good" } else { "bad" });
        }
        let stem = Path::new(&row.parent_file)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(dir.join(format!(
            "{}_{}_{}_{}.json",
            stem,
            make_of_seq(&row.sequence)?,
            row.scan,
            row.charge
        )))
    }

    fn dump(&self, row: &PeptideRow, report: &RowReport) {
        let path = match self.dump_path(row, report) {
            Ok(path) => path,
            Err(e) => {
                warn!("Not writing envelopes of scan {}: {}", row.scan, e);
                return;
            }
        };
        let written = fs::File::create(&path)
            .map_err(|e| e.to_string())
            .and_then(|file| serde_json::to_writer_pretty(file, report).map_err(|e| e.to_string()));
        match written {
            Ok(()) => debug!("Wrote {}", path.display()),
            Err(e) => warn!("Failed to write {}: {}", path.display(), e),
        }
    }
}

fn create_dump_dirs(config: &MatchConfig) -> Result<(), CliError> {
    let dirs = if config.split_dumps {
        vec![config.dump_dir.join("good"), config.dump_dir.join("bad")]
    } else {
        vec![config.dump_dir.clone()]
    };
    for dir in dirs {
        fs::create_dir_all(&dir).map_err(|e| CliError::io(&dir, e))?;
    }
    Ok(())
}

/// Search directories for spectrum files: the directory of the input file, then the configured prefixes.
fn ms1_prefixes(input: &Path, config: &MatchConfig) -> Result<Vec<PathBuf>, CliError> {
    let input_dir = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut prefixes = vec![input_dir];
    for prefix in &config.ms1_prefix {
        if !prefix.is_dir() {
            return Err(CliError::NotADirectory(prefix.clone()));
        }
        prefixes.push(prefix.clone());
    }
    Ok(prefixes)
}

/// Annotate the peptide table at `input` and write the result.
///
/// Returns:
///
/// * `PathBuf` - path of the written table
///
pub fn run(input: &Path, config: &MatchConfig) -> Result<PathBuf, CliError> {
    let table = match &config.atom_table {
        Some(path) => CompositionTable::load(path)?,
        None => CompositionTable::default(),
    };
    let peptides = PeptideTable::read(input, config)?;

    let prefixes = ms1_prefixes(input, config)?;
    let raw_paths = peptides
        .parent_files()
        .into_iter()
        .map(|parent_file| {
            RawFile::locate(&parent_file, &prefixes, config.file_type).map(|path| (parent_file, path))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pool = ThreadPoolBuilder::new().num_threads(config.num_threads()).build()?;
    info!("Using {} thread(s)", pool.current_num_threads());

    let spectra: HashMap<String, RawFile> = pool.install(|| {
        raw_paths
            .par_iter()
            .map(|(parent_file, path)| RawFile::read(path, config.file_type).map(|raw| (parent_file.clone(), raw)))
            .collect::<Result<HashMap<_, _>, _>>()
    })?;

    if config.dump_envelopes {
        create_dump_dirs(config)?;
    }

    info!("Searching for envelopes of {} peptides", peptides.len());
    let matcher = EnvelopeMatcher::new(config, &table, &spectra);
    let outcomes = pool.install(|| matcher.process(&peptides));

    let good = outcomes.iter().filter(|outcome| outcome.good_envelope).count();
    info!("{} of {} peptides have a good envelope", good, outcomes.len());

    let output = peptides.output_path(config.overwrite);
    peptides.write(&output, &outcomes)?;
    Ok(output)
}
