use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use envcore::algorithm::envelope::EnvelopeConfig;
use envcore::chemistry::constants::DEFAULT_ENV_CUTOFF;
use envcore::data::tolerance::{TieBreak, Tolerance};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::errors::CliError;

/// Where the elemental composition of a peptide comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FormulaSource {
    /// The `formula` column of the peptide table.
    #[default]
    Input,
    /// The composition table.
    Calculate,
}

/// Where the survey scan of a fragment scan comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrecursorSource {
    /// The `precursor_scan` column of the peptide table.
    Input,
    /// The spectrum file: the closest preceding survey scan of an ms1 file,
    /// or the last MS1 scan before the MS2 scan of an mzML file.
    #[default]
    Ms1,
}

/// Format of the spectrum files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// MS1 text files, `<stem>.ms1`.
    Ms1,
    /// mzML files, `<stem>.mzML`.
    #[default]
    Mzml,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Ms1 => "ms1",
            FileType::Mzml => "mzML",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub env_co: f64,
    pub ms1_prefix: Vec<PathBuf>,
    pub file_type: FileType,
    pub formula_source: FormulaSource,
    pub pre_scan_src: PrecursorSource,
    pub atom_table: Option<PathBuf>,
    pub tolerance: Tolerance,
    pub tie_break: TieBreak,
    pub mz_margin: f64,
    pub envelope: EnvelopeConfig,
    pub dump_envelopes: bool,
    pub split_dumps: bool,
    pub dump_dir: PathBuf,
    pub threads: Option<usize>,
    pub parallel: bool,
    pub overwrite: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            env_co: DEFAULT_ENV_CUTOFF,
            ms1_prefix: Vec::new(),
            file_type: FileType::default(),
            formula_source: FormulaSource::default(),
            pre_scan_src: PrecursorSource::default(),
            atom_table: None,
            tolerance: Tolerance::default(),
            tie_break: TieBreak::default(),
            mz_margin: 5.0,
            envelope: EnvelopeConfig {
                abundance_threshold: 0.01,
                ..EnvelopeConfig::default()
            },
            dump_envelopes: false,
            split_dumps: false,
            dump_dir: PathBuf::from("envelopes"),
            threads: None,
            parallel: true,
            overwrite: false,
        }
    }
}

impl MatchConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, CliError> {
        let file = File::open(path).map_err(|e| CliError::io(path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Config file (or defaults) overridden by every option given on the command line.
    pub fn with_cli_args(args: &Cli) -> Result<Self, CliError> {
        let mut config = match &args.config {
            Some(path) => MatchConfig::from_json_file(path)?,
            None => MatchConfig::default(),
        };

        if let Some(env_co) = args.env_co {
            config.env_co = env_co;
        }
        config.ms1_prefix.extend(args.ms1_prefix.iter().cloned());
        if let Some(file_type) = args.file_type {
            config.file_type = file_type;
        }
        if let Some(source) = args.formula_source {
            config.formula_source = source;
        }
        if let Some(source) = args.pre_scan_src {
            config.pre_scan_src = source;
        }
        if let Some(path) = &args.atom_table {
            config.atom_table = Some(path.clone());
        }
        if let Some(value) = args.tolerance {
            config.tolerance.value = value;
        }
        if let Some(unit) = args.tolerance_unit {
            config.tolerance.unit = unit;
        }
        if let Some(tie_break) = args.tie_break {
            config.tie_break = tie_break;
        }
        if let Some(margin) = args.mz_margin {
            config.mz_margin = margin;
        }
        config.dump_envelopes |= args.dump_envelopes;
        config.split_dumps |= args.split_dumps;
        if let Some(dir) = &args.dump_dir {
            config.dump_dir = dir.clone();
        }
        if let Some(threads) = args.threads {
            config.threads = Some(threads);
        }
        if let Some(parallel) = args.parallel {
            config.parallel = parallel == 1;
        }
        config.overwrite |= args.overwrite;

        Ok(config)
    }

    /// Worker count handed to the thread pool, 0 lets rayon pick one per logical core.
    pub fn num_threads(&self) -> usize {
        match (self.threads, self.parallel) {
            (Some(threads), _) => threads,
            (None, true) => 0,
            (None, false) => 1,
        }
    }
}
