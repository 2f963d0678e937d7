use std::path::PathBuf;

use clap::Parser;
use envcore::data::tolerance::{TieBreak, ToleranceUnit};

use crate::config::{FileType, FormulaSource, PrecursorSource};

/// Score the MS1 isotope envelopes of identified peptides and flag
/// those whose modified form explains the spectrum best.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tab separated peptide table to annotate
    pub input_file: PathBuf,

    /// JSON configuration file, command line options take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Envelope correlation score cutoff [default: 0.8]
    #[arg(long)]
    pub env_co: Option<f64>,

    /// Additional directory to search for spectrum files, may be repeated
    #[arg(long = "ms1-prefix")]
    pub ms1_prefix: Vec<PathBuf>,

    /// Format of the spectrum files [default: mzml]
    #[arg(short = 't', long, value_enum)]
    pub file_type: Option<FileType>,

    /// Where peptide formulas come from [default: input]
    #[arg(short, long, value_enum)]
    pub formula_source: Option<FormulaSource>,

    /// Where precursor scans come from [default: ms1]
    #[arg(short = 's', long, value_enum)]
    pub pre_scan_src: Option<PrecursorSource>,

    /// Composition table to calculate formulas and modification deltas with
    #[arg(short, long)]
    pub atom_table: Option<PathBuf>,

    /// Matching tolerance [default: 50]
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Unit of the matching tolerance, `th` or `ppm` [default: ppm]
    #[arg(long)]
    pub tolerance_unit: Option<ToleranceUnit>,

    /// Choice between several peaks inside one window, `intensity` or `mz` [default: intensity]
    #[arg(long)]
    pub tie_break: Option<TieBreak>,

    /// Margin in m/z around the candidate envelopes to extract from the spectrum [default: 5.0]
    #[arg(long)]
    pub mz_margin: Option<f64>,

    /// Write the annotated envelopes of every row as JSON
    #[arg(long)]
    pub dump_envelopes: bool,

    /// Write dumps of good and bad envelopes to separate directories
    #[arg(long)]
    pub split_dumps: bool,

    /// Directory for envelope dumps [default: ./envelopes]
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Number of worker threads, overrides --parallel
    #[arg(long)]
    pub threads: Option<usize>,

    /// Process rows in parallel (1) or sequentially (0) [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub parallel: Option<u8>,

    /// Overwrite the input file instead of writing <stem>_env.<ext>
    #[arg(long)]
    pub overwrite: bool,

    /// Debug level logging
    #[arg(short, long)]
    pub verbose: bool,
}
