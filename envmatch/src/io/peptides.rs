use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::info;

use crate::config::{FormulaSource, MatchConfig, PrecursorSource};
use crate::errors::{CliError, RowError};

pub const SEQUENCE: &str = "sequence";
pub const CHARGE: &str = "charge";
pub const SCAN: &str = "scan";
pub const PARENT_FILE: &str = "parent_file";
pub const PRECURSOR_SCAN: &str = "precursor_scan";
pub const FORMULA: &str = "formula";
pub const ENV_SCORE: &str = "env_score";
pub const GOOD_ENVELOPE: &str = "good_envelope";

#[derive(Clone, Copy, Debug)]
struct Columns {
    sequence: usize,
    charge: usize,
    scan: usize,
    parent_file: usize,
    precursor_scan: Option<usize>,
    formula: Option<usize>,
}

/// One identified peptide, parsed from a row of the peptide table.
#[derive(Clone, Debug, PartialEq)]
pub struct PeptideRow {
    pub sequence: String,
    pub charge: i32,
    pub scan: u32,
    pub parent_file: String,
    pub precursor_scan: Option<u32>,
    pub formula: Option<String>,
}

/// Result of matching one row.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RowOutcome {
    /// Score of the sequence as given, `None` when undefined.
    pub env_score: Option<f64>,
    pub good_envelope: bool,
}

/// Tab separated peptide table, every input column is kept for the output.
#[derive(Clone, Debug)]
pub struct PeptideTable {
    pub path: PathBuf,
    headers: StringRecord,
    records: Vec<StringRecord>,
    columns: Columns,
}

fn required(headers: &StringRecord, column: &'static str, path: &Path, reason: &'static str) -> Result<usize, CliError> {
    headers
        .iter()
        .position(|header| header == column)
        .ok_or_else(|| CliError::MissingColumn {
            column,
            path: path.to_path_buf(),
            reason,
        })
}

fn parse_field<T: std::str::FromStr>(record: &StringRecord, index: usize, column: &'static str) -> Result<T, RowError> {
    let value = record.get(index).unwrap_or_default().trim();
    value.parse::<T>().map_err(|_| RowError::InvalidField {
        column,
        value: value.to_string(),
    })
}

impl PeptideTable {
    /// Read a peptide table, checking the columns the configured sources depend on.
    pub fn read<P: AsRef<Path>>(path: P, config: &MatchConfig) -> Result<Self, CliError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CliError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_reader(file);

        let headers = reader.headers()?.clone();
        let columns = Columns {
            sequence: required(&headers, SEQUENCE, path, "every run")?,
            charge: required(&headers, CHARGE, path, "every run")?,
            scan: required(&headers, SCAN, path, "every run")?,
            parent_file: required(&headers, PARENT_FILE, path, "every run")?,
            precursor_scan: match config.pre_scan_src {
                PrecursorSource::Input => Some(required(&headers, PRECURSOR_SCAN, path, "--pre-scan-src input")?),
                PrecursorSource::Ms1 => None,
            },
            formula: match config.formula_source {
                FormulaSource::Input => Some(required(&headers, FORMULA, path, "--formula-source input")?),
                FormulaSource::Calculate => None,
            },
        };

        let records = reader.records().collect::<Result<Vec<_>, _>>()?;
        info!("Read {} peptides from {}", records.len(), path.display());

        Ok(PeptideTable {
            path: path.to_path_buf(),
            headers,
            records,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Parsed view of row `index`.
    pub fn row(&self, index: usize) -> Result<PeptideRow, RowError> {
        let record = &self.records[index];
        let columns = &self.columns;
        Ok(PeptideRow {
            sequence: record.get(columns.sequence).unwrap_or_default().trim().to_string(),
            charge: parse_field(record, columns.charge, CHARGE)?,
            scan: parse_field(record, columns.scan, SCAN)?,
            parent_file: record.get(columns.parent_file).unwrap_or_default().trim().to_string(),
            precursor_scan: columns
                .precursor_scan
                .map(|column| parse_field(record, column, PRECURSOR_SCAN))
                .transpose()?,
            formula: columns
                .formula
                .map(|column| record.get(column).unwrap_or_default().trim().to_string()),
        })
    }

    /// Distinct raw files referenced by the table, in order of first appearance.
    pub fn parent_files(&self) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        for record in &self.records {
            let file = record.get(self.columns.parent_file).unwrap_or_default().trim();
            if !files.iter().any(|known| known == file) {
                files.push(file.to_string());
            }
        }
        files
    }

    /// `<stem>_env.<ext>` next to the input, or the input itself when overwriting.
    pub fn output_path(&self, overwrite: bool) -> PathBuf {
        if overwrite {
            return self.path.clone();
        }
        let stem = self.path.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();
        let name = match self.path.extension() {
            Some(extension) => format!("{}_env.{}", stem, extension.to_string_lossy()),
            None => format!("{}_env", stem),
        };
        self.path.with_file_name(name)
    }

    /// Write all input columns followed by `env_score` and `good_envelope`.
    ///
    /// Existing columns of those names are replaced. Undefined scores are written as `NA`.
    pub fn write<P: AsRef<Path>>(&self, path: P, outcomes: &[RowOutcome]) -> Result<(), CliError> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;

        let kept: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, header)| *header != ENV_SCORE && *header != GOOD_ENVELOPE)
            .map(|(index, _)| index)
            .collect();

        let mut header: Vec<&str> = kept.iter().map(|&index| &self.headers[index]).collect();
        header.extend([ENV_SCORE, GOOD_ENVELOPE]);
        writer.write_record(&header)?;

        for (record, outcome) in self.records.iter().zip(outcomes) {
            let score = match outcome.env_score {
                Some(score) => score.to_string(),
                None => "NA".to_string(),
            };
            let good = if outcome.good_envelope { "True" } else { "False" };

            let mut fields: Vec<&str> = kept.iter().map(|&index| record.get(index).unwrap_or_default()).collect();
            fields.push(&score);
            fields.push(good);
            writer.write_record(&fields)?;
        }
        writer.flush().map_err(|e| CliError::io(path, e))?;

        info!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "sequence\tcharge\tscan\tparent_file\tformula\tenv_score\tprotein\n\
                         PEPR*K\t2\t105\trun_01.raw\tC30H50N10O9\t0.1\tP1\n\
                         GASP\tx\t106\trun_02.raw\tC13H22N4O6\t0.2\tP2\n\
                         GASP\t1\t107\trun_01.raw\tC13H22N4O6\t0.3\tP3\n";

    fn write_table(dir: &Path) -> PathBuf {
        let path = dir.join("peptides.tsv");
        std::fs::write(&path, TABLE).unwrap();
        path
    }

    #[test]
    fn test_read_rows() {
        let dir = tempfile::tempdir().unwrap();
        let table = PeptideTable::read(write_table(dir.path()), &MatchConfig::default()).unwrap();

        assert_eq!(table.len(), 3);
        let row = table.row(0).unwrap();
        assert_eq!(row.sequence, "PEPR*K");
        assert_eq!(row.charge, 2);
        assert_eq!(row.scan, 105);
        assert_eq!(row.formula.as_deref(), Some("C30H50N10O9"));
        assert_eq!(row.precursor_scan, None);

        assert!(matches!(table.row(1), Err(RowError::InvalidField { column: CHARGE, .. })));
        assert_eq!(table.parent_files(), vec!["run_01.raw", "run_02.raw"]);
    }

    #[test]
    fn test_missing_columns_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(dir.path());

        let config = MatchConfig {
            pre_scan_src: PrecursorSource::Input,
            ..MatchConfig::default()
        };
        assert!(matches!(
            PeptideTable::read(&path, &config),
            Err(CliError::MissingColumn { column: PRECURSOR_SCAN, .. })
        ));

        let no_formula = dir.path().join("no_formula.tsv");
        std::fs::write(&no_formula, "sequence\tcharge\tscan\tparent_file\nGASP\t1\t1\ta.raw\n").unwrap();
        assert!(matches!(
            PeptideTable::read(&no_formula, &MatchConfig::default()),
            Err(CliError::MissingColumn { column: FORMULA, .. })
        ));

        let config = MatchConfig {
            formula_source: FormulaSource::Calculate,
            ..MatchConfig::default()
        };
        assert!(PeptideTable::read(&no_formula, &config).is_ok());
    }

    #[test]
    fn test_write_replaces_result_columns() {
        let dir = tempfile::tempdir().unwrap();
        let table = PeptideTable::read(write_table(dir.path()), &MatchConfig::default()).unwrap();
        let output = table.output_path(false);
        assert_eq!(output, dir.path().join("peptides_env.tsv"));
        assert_eq!(table.output_path(true), dir.path().join("peptides.tsv"));

        let outcomes = vec![
            RowOutcome { env_score: Some(0.95), good_envelope: true },
            RowOutcome::default(),
            RowOutcome { env_score: Some(-0.5), good_envelope: false },
        ];
        table.write(&output, &outcomes).unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "sequence\tcharge\tscan\tparent_file\tformula\tprotein\tenv_score\tgood_envelope");
        assert_eq!(lines[1], "PEPR*K\t2\t105\trun_01.raw\tC30H50N10O9\tP1\t0.95\tTrue");
        assert_eq!(lines[2], "GASP\tx\t106\trun_02.raw\tC13H22N4O6\tP2\tNA\tFalse");
        assert_eq!(lines[3], "GASP\t1\t107\trun_01.raw\tC13H22N4O6\tP3\t-0.5\tFalse");
    }
}
