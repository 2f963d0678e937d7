use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use envcore::data::spectrum::{MzSpectrum, SpectrumSource};
use log::{debug, info, warn};
use mzdata::io::mzml::MzMLReader;
use mzdata::prelude::SpectrumLike;

use crate::errors::CliError;

/// Scan number of a native id like `controllerType=0 controllerNumber=1 scan=42`.
fn scan_from_id(id: &str) -> Option<u32> {
    id.split_whitespace()
        .find_map(|part| part.strip_prefix("scan="))
        .and_then(|value| value.parse().ok())
}

/// Survey scans of one run read from mzML, plus the survey scan of every MS2 scan.
///
/// Scan numbers come from the `scan=` part of the spectrum ids. Files whose
/// ids carry no scan number are numbered by spectrum index, starting at 1.
#[derive(Clone, Debug, Default)]
pub struct MzmlFile {
    pub path: PathBuf,
    scans: BTreeMap<u32, MzSpectrum>,
    precursors: BTreeMap<u32, u32>,
}

impl MzmlFile {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CliError::io(path, e))?;
        let mzml = MzmlFile::from_reader(file, path)?;
        info!(
            "Read {} survey scans and {} MS2 scans from {}",
            mzml.len(),
            mzml.precursors.len(),
            path.display()
        );
        Ok(mzml)
    }

    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<Self, CliError> {
        let parse_error = |msg: String| CliError::MzmlParse {
            path: path.to_path_buf(),
            msg,
        };

        let mut scans = BTreeMap::new();
        let mut levels: Vec<(u32, u8)> = Vec::new();
        let mut numbered_by_id = None;

        for spectrum in MzMLReader::new(reader) {
            let by_id = *numbered_by_id.get_or_insert_with(|| {
                let found = scan_from_id(spectrum.id()).is_some();
                if !found {
                    warn!(
                        "No scan number in spectrum id {:?} of {}, numbering scans by index",
                        spectrum.id(),
                        path.display()
                    );
                }
                found
            });
            let scan = if by_id {
                scan_from_id(spectrum.id())
                    .ok_or_else(|| parse_error(format!("no scan number in spectrum id {:?}", spectrum.id())))?
            } else {
                spectrum.index() as u32 + 1
            };

            let level = spectrum.ms_level();
            levels.push((scan, level));
            if level != 1 {
                continue;
            }

            let (mz, intensity) = match spectrum.raw_arrays() {
                Some(arrays) => {
                    let mz = arrays
                        .mzs()
                        .map_err(|e| parse_error(format!("scan {}: {}", scan, e)))?;
                    let intensity = arrays
                        .intensities()
                        .map_err(|e| parse_error(format!("scan {}: {}", scan, e)))?;
                    (mz.to_vec(), intensity.iter().map(|&value| value as f64).collect())
                }
                None => {
                    debug!("Survey scan {} of {} has no peaks", scan, path.display());
                    (Vec::new(), Vec::new())
                }
            };
            if scans.insert(scan, MzSpectrum::new(mz, intensity)).is_some() {
                return Err(parse_error(format!("duplicate scan {}", scan)));
            }
        }

        if levels.is_empty() {
            return Err(parse_error("no spectra found".to_string()));
        }

        // an MS2 scan belongs to the last survey scan before it
        levels.sort_unstable_by_key(|(scan, _)| *scan);
        let mut precursors = BTreeMap::new();
        let mut survey = None;
        for (scan, level) in levels {
            match level {
                1 => survey = Some(scan),
                2 => {
                    if let Some(survey) = survey {
                        precursors.insert(scan, survey);
                    }
                }
                _ => {}
            }
        }

        Ok(MzmlFile {
            path: path.to_path_buf(),
            scans,
            precursors,
        })
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

impl SpectrumSource for MzmlFile {
    fn spectrum(&self, scan: u32, mz_range: Option<(f64, f64)>) -> Option<MzSpectrum> {
        let spectrum = self.scans.get(&scan)?;
        match mz_range {
            Some((mz_min, mz_max)) => Some(spectrum.filter_ranged(mz_min, mz_max)),
            None => Some(spectrum.clone()),
        }
    }

    fn precursor_scan(&self, scan: u32) -> Option<u32> {
        self.precursors.get(&scan).copied()
    }
}
