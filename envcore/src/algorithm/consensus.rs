use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::algorithm::envelope::TheoreticalIsotope;
use crate::algorithm::utility::{lower_bound, pearson_correlation};
use crate::chemistry::constants::MASS_PROTON;
use crate::data::spectrum::MzSpectrum;
use crate::data::tolerance::{TieBreak, Tolerance};
use crate::error::MatchError;

/// A peak of a measured spectrum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservedPeak {
    pub mz: f64,
    pub intensity: f64,
}

impl ObservedPeak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        ObservedPeak { mz, intensity }
    }

    /// All peaks of `spectrum`, in m/z order.
    pub fn from_spectrum(spectrum: &MzSpectrum) -> Vec<Self> {
        spectrum.peaks().map(|(mz, intensity)| ObservedPeak { mz, intensity }).collect()
    }
}

impl From<(f64, f64)> for ObservedPeak {
    fn from((mz, intensity): (f64, f64)) -> Self {
        ObservedPeak { mz, intensity }
    }
}

/// A peak together with the m/z of the peak it is linked to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedPeak {
    pub mz: f64,
    pub intensity: f64,
    pub link_mz: Option<f64>,
}

/// Presentation form of an annotated envelope, written out as JSON by the matcher binary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEnvelope {
    pub sequence: Option<String>,
    pub mono_index: Option<usize>,
    /// `None` while not annotated or when the correlation is undefined.
    pub env_score: Option<f64>,
    pub theoretical: Vec<AnnotatedPeak>,
    pub observed: Vec<AnnotatedPeak>,
}

/// Links a theoretical isotope envelope to observed peaks and scores the fit.
///
/// The inputs captured at construction are never modified, `annotate` always
/// starts over from them, so it can be called repeatedly with other settings.
#[derive(Clone, Debug)]
pub struct ConsensusEnvelope {
    theoretical: Vec<TheoreticalIsotope>,
    observed_input: Vec<ObservedPeak>,
    tolerance: Tolerance,
    tie_break: TieBreak,
    sequence: Option<String>,
    mono: Option<usize>,

    // working state of the last annotation
    theoretical_intensity: Vec<f64>,
    observed: Vec<ObservedPeak>,
    theoretical_links: Vec<Option<usize>>,
    observed_links: Vec<Option<usize>>,
    env_score: f64,
    initialized: bool,
}

impl ConsensusEnvelope {
    /// Creates a new `ConsensusEnvelope`, both peak lists are sorted by m/z.
    ///
    /// # Arguments
    ///
    /// * `theoretical` - theoretical isotope envelope
    /// * `observed` - measured peaks around the envelope
    /// * `tolerance` - matching window
    /// * `tie_break` - choice between several observed peaks in one window
    ///
    /// # Example
    ///
    /// ```
    /// use envcore::algorithm::consensus::{ConsensusEnvelope, ObservedPeak};
    /// use envcore::algorithm::envelope::TheoreticalIsotope;
    /// use envcore::data::tolerance::{TieBreak, Tolerance};
    ///
    /// let theoretical = vec![TheoreticalIsotope::new(500.0, 1.0), TheoreticalIsotope::new(501.0, 0.3)];
    /// let observed = vec![ObservedPeak::new(500.0005, 0.9), ObservedPeak::new(501.001, 0.25)];
    /// let mut envelope = ConsensusEnvelope::new(theoretical, observed, Tolerance::ppm(50.0), TieBreak::Intensity);
    /// envelope.annotate(false, true);
    /// assert!(envelope.score().unwrap() > 0.99);
    /// ```
    pub fn new(
        mut theoretical: Vec<TheoreticalIsotope>,
        mut observed: Vec<ObservedPeak>,
        tolerance: Tolerance,
        tie_break: TieBreak,
    ) -> Self {
        theoretical.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        observed.sort_by(|a, b| a.mz.total_cmp(&b.mz));

        let theoretical_intensity = theoretical.iter().map(|peak| peak.intensity).collect();
        let theoretical_links = vec![None; theoretical.len()];
        let observed_links = vec![None; observed.len()];

        ConsensusEnvelope {
            theoretical,
            observed: observed.clone(),
            observed_input: observed,
            tolerance,
            tie_break,
            sequence: None,
            mono: None,
            theoretical_intensity,
            theoretical_links,
            observed_links,
            env_score: f64::NAN,
            initialized: false,
        }
    }

    /// Label the envelope, usually with the peptide sequence it was built from.
    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = Some(sequence.into());
        self
    }

    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_deref()
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Anchor the monoisotopic peak at `mz`.
    ///
    /// Exactly one theoretical peak must lie within tolerance of `mz`.
    pub fn set_mono(&mut self, mz: f64) -> Result<usize, MatchError> {
        let candidates: Vec<usize> = self
            .theoretical
            .iter()
            .enumerate()
            .filter(|(_, peak)| self.tolerance.contains(peak.mz, mz))
            .map(|(index, _)| index)
            .collect();

        match candidates.as_slice() {
            [] => Err(MatchError::MonoNotFound { mz }),
            [index] => {
                self.mono = Some(*index);
                Ok(*index)
            }
            _ => Err(MatchError::AmbiguousMono { mz, count: candidates.len() }),
        }
    }

    /// Anchor the monoisotopic peak from a neutral monoisotopic mass carrying `charge` protons.
    pub fn set_mono_mass(&mut self, mass: f64, charge: i32) -> Result<usize, MatchError> {
        let mz = if charge == 0 {
            mass
        } else {
            (mass + charge as f64 * MASS_PROTON) / charge.abs() as f64
        };
        self.set_mono(mz)
    }

    pub fn mono_index(&self) -> Option<usize> {
        self.mono
    }

    fn clear(&mut self) {
        self.observed = self.observed_input.clone();
        self.theoretical_intensity = self.theoretical.iter().map(|peak| peak.intensity).collect();
        self.theoretical_links = vec![None; self.theoretical.len()];
        self.observed_links = vec![None; self.observed.len()];
        self.env_score = f64::NAN;
        self.initialized = false;
    }

    // index of the observed peak chosen for `target`, if any lies inside its window
    fn best_candidate(&self, target: f64) -> Option<usize> {
        let (lower, upper) = self.tolerance.bounds(target);
        let start = lower_bound(&self.observed, lower, |peak| peak.mz);
        let end = start
            + self.observed[start..]
                .iter()
                .take_while(|peak| peak.mz <= upper)
                .count();

        let observed = &self.observed;
        match self.tie_break {
            TieBreak::Intensity => (start..end).max_by(|&a, &b| {
                observed[a]
                    .intensity
                    .total_cmp(&observed[b].intensity)
                    .then(observed[a].mz.total_cmp(&observed[b].mz))
            }),
            TieBreak::Mz => (start..end).max_by(|&a, &b| observed[a].mz.total_cmp(&observed[b].mz)),
        }
    }

    /// Link theoretical to observed peaks and compute the envelope score.
    ///
    /// # Arguments
    ///
    /// * `remove_unlabeled` - drop observed peaks left without a link
    /// * `normalize` - scale observed intensities by the largest linked intensity
    ///   and theoretical intensities by their maximum
    ///
    /// Returns:
    ///
    /// * `f64` - Pearson correlation of theoretical against linked observed intensities,
    ///   NaN when undefined
    ///
    pub fn annotate(&mut self, remove_unlabeled: bool, normalize: bool) -> f64 {
        self.clear();

        for index in 0..self.theoretical.len() {
            let Some(chosen) = self.best_candidate(self.theoretical[index].mz) else {
                continue;
            };
            if let Some(previous) = self.observed_links[chosen] {
                debug!(
                    "Observed peak at {:.5} taken over by theoretical peak at {:.5} from {:.5}",
                    self.observed[chosen].mz, self.theoretical[index].mz, self.theoretical[previous].mz
                );
                self.theoretical_links[previous] = None;
            }
            self.observed_links[chosen] = Some(index);
            self.theoretical_links[index] = Some(chosen);
        }

        if remove_unlabeled {
            self.remove_unlabeled();
        }

        if normalize {
            self.normalize();
        }

        let linked: Vec<f64> = self
            .theoretical_links
            .iter()
            .map(|link| link.map_or(0.0, |observed| self.observed[observed].intensity))
            .collect();
        self.env_score = pearson_correlation(&self.theoretical_intensity, &linked);
        self.initialized = true;

        self.env_score
    }

    fn remove_unlabeled(&mut self) {
        let mut remap = vec![None; self.observed.len()];
        let mut kept = Vec::with_capacity(self.observed.len());
        let mut kept_links = Vec::with_capacity(self.observed.len());

        for (old, (peak, link)) in self.observed.iter().zip(&self.observed_links).enumerate() {
            if link.is_some() {
                remap[old] = Some(kept.len());
                kept.push(*peak);
                kept_links.push(*link);
            }
        }

        for link in self.theoretical_links.iter_mut() {
            *link = link.and_then(|old| remap[old]);
        }
        self.observed = kept;
        self.observed_links = kept_links;
    }

    fn normalize(&mut self) {
        let matched_max = self
            .observed
            .iter()
            .zip(&self.observed_links)
            .filter(|(_, link)| link.is_some())
            .map(|(peak, _)| peak.intensity)
            .fold(f64::NAN, f64::max);

        let observed_max = if matched_max.is_nan() {
            warn!(
                "No matched peaks for {}, normalizing by the spectrum maximum",
                self.sequence.as_deref().unwrap_or("envelope")
            );
            self.observed.iter().map(|peak| peak.intensity).fold(f64::NAN, f64::max)
        } else {
            matched_max
        };

        if observed_max.is_finite() && observed_max > 0.0 {
            for peak in self.observed.iter_mut() {
                peak.intensity /= observed_max;
            }
        }

        let theoretical_max = self.theoretical_intensity.iter().copied().fold(f64::NAN, f64::max);
        if theoretical_max.is_finite() && theoretical_max > 0.0 {
            for intensity in self.theoretical_intensity.iter_mut() {
                *intensity /= theoretical_max;
            }
        }
    }

    /// Raw score of the last annotation, NaN if undefined or not annotated yet.
    pub fn env_score(&self) -> f64 {
        self.env_score
    }

    /// Score of the last annotation, `None` if undefined or not annotated yet.
    pub fn score(&self) -> Option<f64> {
        if self.initialized && !self.env_score.is_nan() {
            Some(self.env_score)
        } else {
            None
        }
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Theoretical peaks with the intensities of the last annotation.
    pub fn theoretical(&self) -> impl Iterator<Item = TheoreticalIsotope> + '_ {
        self.theoretical
            .iter()
            .zip(&self.theoretical_intensity)
            .map(|(peak, intensity)| TheoreticalIsotope::new(peak.mz, *intensity))
    }

    /// Observed working set of the last annotation.
    pub fn observed(&self) -> &[ObservedPeak] {
        &self.observed
    }

    pub fn theoretical_links(&self) -> &[Option<usize>] {
        &self.theoretical_links
    }

    pub fn observed_links(&self) -> &[Option<usize>] {
        &self.observed_links
    }

    pub fn matched_count(&self) -> usize {
        self.theoretical_links.iter().filter(|link| link.is_some()).count()
    }

    pub fn annotated(&self) -> AnnotatedEnvelope {
        let theoretical = self
            .theoretical()
            .zip(&self.theoretical_links)
            .map(|(peak, link)| AnnotatedPeak {
                mz: peak.mz,
                intensity: peak.intensity,
                link_mz: link.map(|observed| self.observed[observed].mz),
            })
            .collect();

        let observed = self
            .observed
            .iter()
            .zip(&self.observed_links)
            .map(|(peak, link)| AnnotatedPeak {
                mz: peak.mz,
                intensity: peak.intensity,
                link_mz: link.map(|theoretical| self.theoretical[theoretical].mz),
            })
            .collect();

        AnnotatedEnvelope {
            sequence: self.sequence.clone(),
            mono_index: self.mono,
            env_score: self.score(),
            theoretical,
            observed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theoretical(peaks: &[(f64, f64)]) -> Vec<TheoreticalIsotope> {
        peaks.iter().map(|&peak| peak.into()).collect()
    }

    fn observed(peaks: &[(f64, f64)]) -> Vec<ObservedPeak> {
        peaks.iter().map(|&peak| peak.into()).collect()
    }

    fn scenario() -> ConsensusEnvelope {
        ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0), (501.0, 0.3)]),
            observed(&[(500.0005, 0.9), (501.001, 0.25)]),
            Tolerance::ppm(50.0),
            TieBreak::Intensity,
        )
    }

    #[test]
    fn test_two_peak_scenario() {
        let mut envelope = scenario();
        assert!(!envelope.initialized());
        assert_eq!(envelope.score(), None);

        let score = envelope.annotate(false, true);
        assert!(score > 0.99);
        assert_eq!(envelope.matched_count(), 2);
        assert_eq!(envelope.theoretical_links(), &[Some(0), Some(1)]);
        assert_eq!(envelope.observed_links(), &[Some(0), Some(1)]);
    }

    #[test]
    fn test_empty_observed_is_undefined() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0), (501.0, 0.3)]),
            Vec::new(),
            Tolerance::ppm(50.0),
            TieBreak::Intensity,
        );
        let score = envelope.annotate(false, true);
        assert!(score.is_nan());
        assert!(envelope.initialized());
        assert_eq!(envelope.score(), None);
        assert_eq!(envelope.matched_count(), 0);
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let mut envelope = scenario();
        let first = envelope.annotate(false, true);
        let observed_after_first = envelope.observed().to_vec();
        let second = envelope.annotate(false, true);
        assert!((first - second).abs() < 1e-12);
        assert_eq!(envelope.observed(), observed_after_first.as_slice());
    }

    #[test]
    fn test_inputs_are_sorted() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(501.0, 0.3), (500.0, 1.0)]),
            observed(&[(501.001, 0.25), (500.0005, 0.9)]),
            Tolerance::ppm(50.0),
            TieBreak::Intensity,
        );
        envelope.annotate(false, false);
        assert_eq!(envelope.observed()[0].mz, 500.0005);
        assert_eq!(envelope.theoretical_links(), &[Some(0), Some(1)]);
    }

    #[test]
    fn test_widening_tolerance_only_adds_matches() {
        let theo = theoretical(&[(500.0, 1.0), (501.0, 0.5), (502.0, 0.2)]);
        let obs = observed(&[(500.01, 10.0), (501.03, 5.0), (502.06, 2.0)]);

        let mut previous: Vec<usize> = Vec::new();
        for width in [0.02, 0.05, 0.1] {
            let mut envelope = ConsensusEnvelope::new(theo.clone(), obs.clone(), Tolerance::th(width), TieBreak::Intensity);
            envelope.annotate(false, false);
            let matched: Vec<usize> = envelope
                .theoretical_links()
                .iter()
                .enumerate()
                .filter(|(_, link)| link.is_some())
                .map(|(index, _)| index)
                .collect();
            assert!(previous.iter().all(|index| matched.contains(index)));
            assert!(matched.len() >= previous.len());
            previous = matched;
        }
        assert_eq!(previous, vec![0, 1, 2]);
    }

    #[test]
    fn test_tie_break_by_intensity() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0)]),
            observed(&[(499.99, 5.0), (500.0, 9.0), (500.01, 3.0)]),
            Tolerance::th(0.02),
            TieBreak::Intensity,
        );
        envelope.annotate(false, false);
        assert_eq!(envelope.theoretical_links(), &[Some(1)]);

        // equal intensities go to the larger m/z
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0)]),
            observed(&[(499.99, 9.0), (500.01, 9.0)]),
            Tolerance::th(0.02),
            TieBreak::Intensity,
        );
        envelope.annotate(false, false);
        assert_eq!(envelope.theoretical_links(), &[Some(1)]);
    }

    #[test]
    fn test_tie_break_by_mz() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0)]),
            observed(&[(499.99, 5.0), (500.0, 9.0), (500.01, 3.0), (500.5, 100.0)]),
            Tolerance::th(0.02),
            TieBreak::Mz,
        );
        envelope.annotate(false, false);
        assert_eq!(envelope.theoretical_links(), &[Some(2)]);
    }

    #[test]
    fn test_later_peak_takes_over_link() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0), (500.02, 0.5)]),
            observed(&[(500.01, 3.0)]),
            Tolerance::th(0.02),
            TieBreak::Intensity,
        );
        envelope.annotate(false, false);
        assert_eq!(envelope.theoretical_links(), &[None, Some(0)]);
        assert_eq!(envelope.observed_links(), &[Some(1)]);
    }

    #[test]
    fn test_set_mono() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0), (500.01, 0.5), (501.0, 0.3)]),
            Vec::new(),
            Tolerance::th(0.02),
            TieBreak::Intensity,
        );
        assert_eq!(
            envelope.set_mono(500.005),
            Err(MatchError::AmbiguousMono { mz: 500.005, count: 2 })
        );
        assert_eq!(envelope.set_mono(700.0), Err(MatchError::MonoNotFound { mz: 700.0 }));
        assert_eq!(envelope.mono_index(), None);

        assert_eq!(envelope.set_mono(501.0), Ok(2));
        let mass = 2.0 * 501.0 - 2.0 * MASS_PROTON;
        assert_eq!(envelope.set_mono_mass(mass, 2), Ok(2));
        assert_eq!(envelope.mono_index(), Some(2));
    }

    #[test]
    fn test_normalize_falls_back_to_spectrum_maximum() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 2.0), (501.0, 1.0)]),
            observed(&[(600.0, 10.0), (601.0, 20.0)]),
            Tolerance::ppm(50.0),
            TieBreak::Intensity,
        );
        let score = envelope.annotate(false, true);
        assert!(score.is_nan());
        let intensities: Vec<f64> = envelope.observed().iter().map(|peak| peak.intensity).collect();
        assert_eq!(intensities, vec![0.5, 1.0]);
        let theoretical: Vec<f64> = envelope.theoretical().map(|peak| peak.intensity).collect();
        assert_eq!(theoretical, vec![1.0, 0.5]);
    }

    #[test]
    fn test_normalize_by_matched_maximum() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0), (501.0, 0.5)]),
            observed(&[(500.0, 40.0), (501.0, 20.0), (502.5, 80.0)]),
            Tolerance::th(0.01),
            TieBreak::Intensity,
        );
        envelope.annotate(false, true);
        let intensities: Vec<f64> = envelope.observed().iter().map(|peak| peak.intensity).collect();
        assert_eq!(intensities, vec![1.0, 0.5, 2.0]);
        assert!((envelope.env_score() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_remove_unlabeled_reindexes_links() {
        let mut envelope = ConsensusEnvelope::new(
            theoretical(&[(500.0, 1.0), (501.0, 0.4)]),
            observed(&[(499.0, 7.0), (500.001, 10.0), (500.5, 3.0), (501.0, 4.0)]),
            Tolerance::th(0.01),
            TieBreak::Intensity,
        );
        envelope.annotate(true, false);
        assert_eq!(envelope.observed().len(), 2);
        assert_eq!(envelope.theoretical_links(), &[Some(0), Some(1)]);
        assert_eq!(envelope.observed_links(), &[Some(0), Some(1)]);

        // the next annotation starts from the full peak list again
        envelope.annotate(false, false);
        assert_eq!(envelope.observed().len(), 4);
        assert_eq!(envelope.theoretical_links(), &[Some(1), Some(3)]);
    }

    #[test]
    fn test_annotated_envelope() {
        let mut envelope = scenario().with_sequence("PEPTIDE");
        envelope.set_mono(500.0).unwrap();
        envelope.annotate(false, true);

        let annotated = envelope.annotated();
        assert_eq!(annotated.sequence.as_deref(), Some("PEPTIDE"));
        assert_eq!(annotated.mono_index, Some(0));
        assert!(annotated.env_score.unwrap() > 0.99);
        assert_eq!(annotated.theoretical[1].link_mz, Some(501.001));
        assert_eq!(annotated.observed[0].link_mz, Some(500.0));

        let json = serde_json::to_value(&annotated).unwrap();
        assert_eq!(json["sequence"], "PEPTIDE");
        assert_eq!(json["theoretical"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_from_spectrum() {
        let spectrum = MzSpectrum::new(vec![501.0, 500.0], vec![2.0, 1.0]);
        let peaks = ObservedPeak::from_spectrum(&spectrum);
        assert_eq!(peaks, vec![ObservedPeak::new(500.0, 1.0), ObservedPeak::new(501.0, 2.0)]);
    }
}
