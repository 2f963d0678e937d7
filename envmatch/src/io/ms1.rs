use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use envcore::data::spectrum::{MzSpectrum, SpectrumSource};
use log::info;

use crate::errors::CliError;

/// Survey scans of one run, read from the MS1 text format.
///
/// `H` lines are file headers, `S <scan> <scan> [<mz>]` starts a scan,
/// `I`, `Z` and `D` lines carry scan metadata and are skipped, every other
/// line is a peak `<mz> <intensity> [...]` of the current scan.
#[derive(Clone, Debug, Default)]
pub struct Ms1File {
    pub path: PathBuf,
    scans: BTreeMap<u32, MzSpectrum>,
}

impl Ms1File {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CliError::io(path, e))?;
        let ms1 = Ms1File::from_reader(BufReader::new(file), path)?;
        info!("Read {} scans from {}", ms1.len(), path.display());
        Ok(ms1)
    }

    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self, CliError> {
        let parse_error = |line: usize, msg: String| CliError::Ms1Parse {
            path: path.to_path_buf(),
            line,
            msg,
        };

        let mut scans = BTreeMap::new();
        let mut current: Option<(u32, Vec<f64>, Vec<f64>)> = None;

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|e| CliError::io(path, e))?;
            let mut fields = line.split_whitespace();
            let Some(first) = fields.next() else {
                continue;
            };

            match first {
                "H" | "I" | "Z" | "D" => {}
                "S" => {
                    if let Some((scan, mz, intensity)) = current.take() {
                        scans.insert(scan, MzSpectrum::new(mz, intensity));
                    }
                    let scan = fields
                        .next()
                        .and_then(|value| value.parse::<u32>().ok())
                        .ok_or_else(|| parse_error(line_number, format!("invalid scan line {:?}", line)))?;
                    if scans.contains_key(&scan) {
                        return Err(parse_error(line_number, format!("duplicate scan {}", scan)));
                    }
                    current = Some((scan, Vec::new(), Vec::new()));
                }
                _ => {
                    let Some((_, mz, intensity)) = current.as_mut() else {
                        return Err(parse_error(line_number, "peak before the first scan".to_string()));
                    };
                    let peak_mz = first.parse::<f64>();
                    let peak_intensity = fields.next().map(str::parse::<f64>);
                    match (peak_mz, peak_intensity) {
                        (Ok(peak_mz), Some(Ok(peak_intensity))) => {
                            mz.push(peak_mz);
                            intensity.push(peak_intensity);
                        }
                        _ => return Err(parse_error(line_number, format!("invalid peak line {:?}", line))),
                    }
                }
            }
        }

        if let Some((scan, mz, intensity)) = current {
            scans.insert(scan, MzSpectrum::new(mz, intensity));
        }

        Ok(Ms1File {
            path: path.to_path_buf(),
            scans,
        })
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn scan_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.scans.keys().copied()
    }
}

impl SpectrumSource for Ms1File {
    fn spectrum(&self, scan: u32, mz_range: Option<(f64, f64)>) -> Option<MzSpectrum> {
        let spectrum = self.scans.get(&scan)?;
        match mz_range {
            Some((mz_min, mz_max)) => Some(spectrum.filter_ranged(mz_min, mz_max)),
            None => Some(spectrum.clone()),
        }
    }

    fn precursor_scan(&self, scan: u32) -> Option<u32> {
        self.scans.range(..=scan).next_back().map(|(survey, _)| *survey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "H\tCreationDate\ttoday\n\
                          H\tExtractor\ttest\n\
                          S\t000010\t000010\n\
                          I\tRTime\t1.5\n\
                          Z\t1\t1000.0\n\
                          501.0 20.0\n\
                          500.0 100.0 0 0\n\
                          S\t000020\t000020\n\
                          I\tRTime\t1.7\n\
                          600.0 5.0\n";

    fn sample() -> Ms1File {
        Ms1File::from_reader(Cursor::new(SAMPLE), Path::new("sample.ms1")).unwrap()
    }

    #[test]
    fn test_read_scans() {
        let ms1 = sample();
        assert_eq!(ms1.scan_numbers().collect::<Vec<_>>(), vec![10, 20]);

        let spectrum = ms1.spectrum(10, None).unwrap();
        assert_eq!(*spectrum.mz, vec![500.0, 501.0]);
        assert_eq!(*spectrum.intensity, vec![100.0, 20.0]);
    }

    #[test]
    fn test_spectrum_range_and_missing_scan() {
        let ms1 = sample();
        let spectrum = ms1.spectrum(10, Some((500.5, 510.0))).unwrap();
        assert_eq!(*spectrum.mz, vec![501.0]);
        assert!(ms1.spectrum(15, None).is_none());
    }

    #[test]
    fn test_precursor_scan() {
        let ms1 = sample();
        assert_eq!(ms1.precursor_scan(9), None);
        assert_eq!(ms1.precursor_scan(10), Some(10));
        assert_eq!(ms1.precursor_scan(19), Some(10));
        assert_eq!(ms1.precursor_scan(25), Some(20));
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let orphan = Ms1File::from_reader(Cursor::new("H\tx\n500.0 1.0\n"), Path::new("a.ms1"));
        assert!(matches!(orphan, Err(CliError::Ms1Parse { line: 2, .. })));

        let garbage = Ms1File::from_reader(Cursor::new("S\t1\t1\n500.0 abc\n"), Path::new("a.ms1"));
        assert!(matches!(garbage, Err(CliError::Ms1Parse { line: 2, .. })));

        let duplicate = Ms1File::from_reader(Cursor::new("S\t1\t1\nS\t1\t1\n"), Path::new("a.ms1"));
        assert!(matches!(duplicate, Err(CliError::Ms1Parse { line: 2, .. })));
    }
}
