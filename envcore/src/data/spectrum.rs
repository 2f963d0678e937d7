use std::sync::Arc;

use itertools::Itertools;

/// Represents a mass spectrum with associated m/z values and intensities.
///
/// Uses Arc<Vec<T>> for efficient cloning - clone is O(1) instead of O(n).
#[derive(Clone, Debug)]
pub struct MzSpectrum {
    pub mz: Arc<Vec<f64>>,
    pub intensity: Arc<Vec<f64>>,
}

impl MzSpectrum {
    /// Constructs a new `MzSpectrum`.
    ///
    /// # Arguments
    ///
    /// * `mz` - A vector of m/z values.
    /// * `intensity` - A vector of intensity values corresponding to the m/z values.
    ///
    /// Peaks are sorted by m/z; surplus values of the longer vector are dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use envcore::data::spectrum::MzSpectrum;
    /// let spectrum = MzSpectrum::new(vec![200.0, 100.0], vec![20.0, 10.0]);
    /// assert_eq!(*spectrum.mz, vec![100.0, 200.0]);
    /// assert_eq!(*spectrum.intensity, vec![10.0, 20.0]);
    /// ```
    pub fn new(mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        let (mz, intensity): (Vec<f64>, Vec<f64>) = if mz.is_sorted() && mz.len() == intensity.len() {
            (mz, intensity)
        } else {
            mz.into_iter()
                .zip(intensity)
                .sorted_by(|a, b| a.0.total_cmp(&b.0))
                .unzip()
        };
        MzSpectrum {
            mz: Arc::new(mz),
            intensity: Arc::new(intensity),
        }
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    /// (m/z, intensity) pairs in m/z order.
    pub fn peaks(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mz.iter().copied().zip(self.intensity.iter().copied())
    }

    /// Keep peaks inside an inclusive m/z window.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use envcore::data::spectrum::MzSpectrum;
    /// let spectrum = MzSpectrum::new(vec![100.0, 200.0, 300.0], vec![10.0, 20.0, 30.0]);
    /// let window = spectrum.filter_ranged(150.0, 300.0);
    /// assert_eq!(*window.mz, vec![200.0, 300.0]);
    /// ```
    pub fn filter_ranged(&self, mz_min: f64, mz_max: f64) -> Self {
        let mz = &self.mz[..self.mz.len().min(self.intensity.len())];
        let start = mz.partition_point(|&value| value < mz_min);
        let end = mz.partition_point(|&value| value <= mz_max).max(start);
        MzSpectrum {
            mz: Arc::new(self.mz[start..end].to_vec()),
            intensity: Arc::new(self.intensity[start..end].to_vec()),
        }
    }
}

/// Provider of observed spectra, e.g. a parsed raw file.
pub trait SpectrumSource {
    /// Peaks of `scan`, restricted to the inclusive `mz_range` when given.
    /// `None` means the scan does not exist.
    fn spectrum(&self, scan: u32, mz_range: Option<(f64, f64)>) -> Option<MzSpectrum>;

    /// Survey scan a fragment scan was acquired from, if known.
    fn precursor_scan(&self, scan: u32) -> Option<u32>;
}
