use log::debug;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::isotope::IsotopologueSource;
use crate::algorithm::utility::find_nearest_index;
use crate::chemistry::composition::ElementalComposition;
use crate::chemistry::constants::{DEFAULT_ABUNDANCE_THRESHOLD, DEFAULT_MASS_DEFECT_MATCH_RANGE, ISOTOPE_THRESHOLD};
use crate::error::EnvelopeError;

/// A peak of a theoretical isotope envelope.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalIsotope {
    pub mz: f64,
    pub intensity: f64,
}

impl TheoreticalIsotope {
    pub fn new(mz: f64, intensity: f64) -> Self {
        TheoreticalIsotope { mz, intensity }
    }
}

impl From<(f64, f64)> for TheoreticalIsotope {
    fn from((mz, intensity): (f64, f64)) -> Self {
        TheoreticalIsotope { mz, intensity }
    }
}

/// Parameters of envelope construction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Minimum abundance of a reported isotopologue.
    pub abundance_threshold: f64,
    /// Isotopologues closer than this (in m/z) are merged into one peak.
    pub mass_defect_match_range: f64,
    pub combine_defects: bool,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        EnvelopeConfig {
            abundance_threshold: DEFAULT_ABUNDANCE_THRESHOLD,
            mass_defect_match_range: DEFAULT_MASS_DEFECT_MATCH_RANGE,
            combine_defects: true,
        }
    }
}

/// Running average over a group of nearly degenerate isotopologues.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MassDefectBin {
    mz_sum: f64,
    count: usize,
    abundance: f64,
}

impl MassDefectBin {
    pub fn new(mz: f64, abundance: f64) -> Self {
        MassDefectBin { mz_sum: mz, count: 1, abundance }
    }

    pub fn absorb(&mut self, mz: f64, abundance: f64) {
        self.mz_sum += mz;
        self.count += 1;
        self.abundance += abundance;
    }

    pub fn avg_mz(&self) -> f64 {
        self.mz_sum / self.count as f64
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn abundance(&self) -> f64 {
        self.abundance
    }
}

/// Mass-defect bins kept in an arena with a sorted index over their current `avg_mz`.
///
/// The sort key moves whenever a bin absorbs a point, so the index entry of a
/// mutated bin is removed and reinserted instead of being edited in place.
#[derive(Clone, Debug, Default)]
pub struct MassDefectBins {
    bins: Vec<MassDefectBin>,
    index: Vec<(OrderedFloat<f64>, usize)>,
}

impl MassDefectBins {
    pub fn new() -> Self {
        MassDefectBins::default()
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    fn reindex(&mut self, slot: usize) {
        let key = (OrderedFloat(self.bins[slot].avg_mz()), slot);
        let position = self.index.partition_point(|entry| *entry < key);
        self.index.insert(position, key);
    }

    /// Absorb `mz` into the nearest bin if it lies within `match_range`, else open a new bin.
    pub fn insert(&mut self, mz: f64, abundance: f64, match_range: f64) {
        if !self.index.is_empty() {
            let position = find_nearest_index(&self.index, mz, |entry| entry.0.into_inner());
            let (nearest, slot) = self.index[position];
            if (mz - nearest.into_inner()).abs() <= match_range {
                self.index.remove(position);
                self.bins[slot].absorb(mz, abundance);
                self.reindex(slot);
                return;
            }
        }
        self.bins.push(MassDefectBin::new(mz, abundance));
        self.reindex(self.bins.len() - 1);
    }

    /// Bins in ascending `avg_mz`.
    pub fn iter(&self) -> impl Iterator<Item = &MassDefectBin> + '_ {
        self.index.iter().map(|(_, slot)| &self.bins[*slot])
    }

    /// One (avg m/z, summed abundance) peak per bin, ascending m/z.
    pub fn to_envelope(&self) -> Vec<TheoreticalIsotope> {
        self.iter()
            .map(|bin| TheoreticalIsotope::new(bin.avg_mz(), bin.abundance()))
            .collect()
    }
}

/// Build the theoretical isotope envelope of a composition.
///
/// Arguments:
///
/// * `source` - isotopologue enumerator
/// * `composition` - composition, its `H+` count is the charge of the envelope
/// * `config` - abundance floor, mass defect match range and whether to merge defects
///
/// Returns:
///
/// * `Vec<TheoreticalIsotope>` - (m/z, abundance) pairs, ascending m/z when defects
///   are combined, enumeration order otherwise
///
/// # Examples
///
/// ```
/// use envcore::algorithm::envelope::{build_envelope, EnvelopeConfig};
/// use envcore::algorithm::isotope::IsotopologueEnumerator;
/// use envcore::chemistry::composition_table::CompositionTable;
///
/// let table = CompositionTable::default();
/// let composition = table.get_composition("PEPTIDE", 2, true, true).unwrap();
/// let envelope = build_envelope(&IsotopologueEnumerator::default(), &composition, &EnvelopeConfig::default()).unwrap();
/// assert!(envelope.windows(2).all(|w| w[0].mz < w[1].mz));
/// ```
pub fn build_envelope<S: IsotopologueSource + ?Sized>(
    source: &S,
    composition: &ElementalComposition,
    config: &EnvelopeConfig,
) -> Result<Vec<TheoreticalIsotope>, EnvelopeError> {
    let isotopologues = source.isotopologues(composition, ISOTOPE_THRESHOLD, config.abundance_threshold)?;

    let mut raw = Vec::with_capacity(isotopologues.len());
    for isotopologue in &isotopologues {
        raw.push(TheoreticalIsotope::new(isotopologue.composition.exact_mz()?, isotopologue.abundance));
    }

    if !config.combine_defects {
        return Ok(raw);
    }

    let mut bins = MassDefectBins::new();
    for isotope in &raw {
        bins.insert(isotope.mz, isotope.intensity, config.mass_defect_match_range);
    }
    debug!(
        "Combined {} isotopologues of {} into {} peaks",
        raw.len(),
        composition,
        bins.len()
    );

    Ok(bins.to_envelope())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::isotope::{Isotopologue, IsotopologueEnumerator};
    use crate::chemistry::composition_table::CompositionTable;
    use crate::chemistry::constants::{MASS_NEUTRON, MASS_PROTON};

    // hands out (carbon-12 count, abundance) pairs as isotopologues
    struct FixedSource(Vec<(i32, f64)>);

    impl IsotopologueSource for FixedSource {
        fn isotopologues(
            &self,
            _composition: &ElementalComposition,
            _isotope_threshold: f64,
            _overall_threshold: f64,
        ) -> Result<Vec<Isotopologue>, EnvelopeError> {
            Ok(self
                .0
                .iter()
                .map(|&(carbons, abundance)| {
                    let mut composition = ElementalComposition::new();
                    composition.set("C[12]", carbons);
                    Isotopologue { composition, abundance }
                })
                .collect())
        }
    }

    #[test]
    fn test_single_cluster_properties() {
        let inputs = [(500.001, 0.2), (500.010, 0.1), (499.995, 0.3), (500.020, 0.05)];
        let mut bins = MassDefectBins::new();
        for (mz, abundance) in inputs {
            bins.insert(mz, abundance, 0.05);
        }
        assert_eq!(bins.len(), 1);
        let bin = bins.iter().next().unwrap();
        assert!((bin.abundance() - 0.65).abs() < 1e-12);
        assert!(bin.avg_mz() >= 499.995 && bin.avg_mz() <= 500.020);
        assert_eq!(bin.count(), 4);
    }

    #[test]
    fn test_bins_stay_sorted_after_drift() {
        let mut bins = MassDefectBins::new();
        bins.insert(100.0, 1.0, 0.05);
        bins.insert(100.04, 1.0, 0.05);
        bins.insert(100.06, 1.0, 0.05);
        bins.insert(99.0, 1.0, 0.05);
        bins.insert(101.0, 1.0, 0.05);

        let envelope = bins.to_envelope();
        assert!(envelope.windows(2).all(|w| w[0].mz <= w[1].mz));
        assert_eq!(envelope.len(), 3);
        assert!((envelope[1].mz - 300.1 / 3.0).abs() < 1e-9);
        assert!((envelope[1].intensity - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_far_points_open_new_bins() {
        let mut bins = MassDefectBins::new();
        for mz in [300.0, 100.0, 200.0] {
            bins.insert(mz, 1.0, 0.05);
        }
        let mz: Vec<f64> = bins.to_envelope().iter().map(|p| p.mz).collect();
        assert_eq!(mz, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_uncombined_keeps_enumeration_order() {
        let source = FixedSource(vec![(2, 0.7), (1, 0.3)]);
        let config = EnvelopeConfig { combine_defects: false, ..EnvelopeConfig::default() };
        let envelope = build_envelope(&source, &ElementalComposition::new(), &config).unwrap();
        assert_eq!(envelope, vec![TheoreticalIsotope::new(24.0, 0.7), TheoreticalIsotope::new(12.0, 0.3)]);

        let combined = build_envelope(&source, &ElementalComposition::new(), &EnvelopeConfig::default()).unwrap();
        assert_eq!(combined, vec![TheoreticalIsotope::new(12.0, 0.3), TheoreticalIsotope::new(24.0, 0.7)]);
    }

    #[test]
    fn test_peptide_envelope_spacing() {
        let table = CompositionTable::default();
        let composition = table.get_composition("SAMPLERK", 2, true, true).unwrap();
        let envelope = build_envelope(&IsotopologueEnumerator::default(), &composition, &EnvelopeConfig::default()).unwrap();

        assert!(envelope.len() >= 3);
        // neighbouring peaks sit roughly one neutron apart at charge two
        for pair in envelope.windows(2) {
            let spacing = pair[1].mz - pair[0].mz;
            assert!((spacing - MASS_NEUTRON / 2.0).abs() < 0.01, "spacing {}", spacing);
        }
        // monoisotopic peak is the most abundant for a small peptide
        let max = envelope.iter().map(|p| p.intensity).fold(f64::MIN, f64::max);
        assert_eq!(envelope[0].intensity, max);
    }

    #[test]
    fn test_negative_charge_envelope() {
        let table = CompositionTable::default();
        let source = IsotopologueEnumerator::default();
        let config = EnvelopeConfig::default();
        let negative = table.get_composition("PEPTIDE", -2, true, true).unwrap();
        let positive = table.get_composition("PEPTIDE", 2, true, true).unwrap();

        let negative = build_envelope(&source, &negative, &config).unwrap();
        let positive = build_envelope(&source, &positive, &config).unwrap();
        assert_eq!(negative.len(), positive.len());
        assert!((positive[0].mz - negative[0].mz - 2.0 * MASS_PROTON).abs() < 1e-9);
    }

    #[test]
    fn test_combining_reduces_peak_count() {
        let table = CompositionTable::default();
        let composition = table.get_composition("MCMCMCKR", 1, true, true).unwrap();
        let source = IsotopologueEnumerator::default();
        let raw = build_envelope(
            &source,
            &composition,
            &EnvelopeConfig { combine_defects: false, ..EnvelopeConfig::default() },
        )
        .unwrap();
        let combined = build_envelope(&source, &composition, &EnvelopeConfig::default()).unwrap();

        assert!(combined.len() < raw.len());
        let raw_total: f64 = raw.iter().map(|p| p.intensity).sum();
        let combined_total: f64 = combined.iter().map(|p| p.intensity).sum();
        assert!((raw_total - combined_total).abs() < 1e-9);
    }
}
