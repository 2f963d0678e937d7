use std::path::{Path, PathBuf};

use envcore::data::spectrum::{MzSpectrum, SpectrumSource};
use log::debug;

use crate::config::FileType;
use crate::errors::CliError;
use crate::io::ms1::Ms1File;
use crate::io::mzml::MzmlFile;

/// Spectra of one run in any supported format.
#[derive(Clone, Debug)]
pub enum RawFile {
    Ms1(Ms1File),
    Mzml(MzmlFile),
}

impl RawFile {
    pub fn read<P: AsRef<Path>>(path: P, file_type: FileType) -> Result<Self, CliError> {
        match file_type {
            FileType::Ms1 => Ok(RawFile::Ms1(Ms1File::read(path)?)),
            FileType::Mzml => Ok(RawFile::Mzml(MzmlFile::read(path)?)),
        }
    }

    /// Find the spectrum file of a raw file: `<prefix>/<stem>.<ext>` for the first prefix that has one.
    ///
    /// # Arguments
    ///
    /// * `parent_file` - raw file name as written in the peptide table
    /// * `prefixes` - directories to search, in order
    /// * `file_type` - format, decides the extension
    ///
    pub fn locate(parent_file: &str, prefixes: &[PathBuf], file_type: FileType) -> Result<PathBuf, CliError> {
        let not_found = || CliError::RawFileNotFound {
            parent_file: parent_file.to_string(),
            extension: file_type.extension(),
        };
        let stem = Path::new(parent_file).file_stem().ok_or_else(not_found)?;

        for prefix in prefixes {
            let candidate = prefix.join(format!("{}.{}", stem.to_string_lossy(), file_type.extension()));
            if candidate.is_file() {
                debug!("Found spectrum file for {}: {}", parent_file, candidate.display());
                return Ok(candidate);
            }
        }
        Err(not_found())
    }
}

impl SpectrumSource for RawFile {
    fn spectrum(&self, scan: u32, mz_range: Option<(f64, f64)>) -> Option<MzSpectrum> {
        match self {
            RawFile::Ms1(file) => file.spectrum(scan, mz_range),
            RawFile::Mzml(file) => file.spectrum(scan, mz_range),
        }
    }

    fn precursor_scan(&self, scan: u32) -> Option<u32> {
        match self {
            RawFile::Ms1(file) => file.precursor_scan(scan),
            RawFile::Mzml(file) => file.precursor_scan(scan),
        }
    }
}
