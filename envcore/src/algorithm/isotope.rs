use log::trace;
use statrs::function::factorial::ln_factorial;

use crate::chemistry::composition::ElementalComposition;
use crate::chemistry::constants::CHARGE_CARRIER;
use crate::chemistry::elements::{isotope_mass, isotope_symbol, isotopes, most_abundant, split_isotope_label};
use crate::error::EnvelopeError;

/// One isotopic variant of a composition.
///
/// Atoms of the variant are explicit isotopes (`C[12]`, `C[13]`), the `H+`
/// count of the source composition is carried unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct Isotopologue {
    pub composition: ElementalComposition,
    pub abundance: f64,
}

/// Anything able to expand a composition into its isotopologues.
pub trait IsotopologueSource {
    /// Enumerate isotopologues of `composition`.
    ///
    /// Isotopes rarer than `isotope_threshold` are never substituted, variants
    /// rarer than `overall_threshold` are not reported.
    fn isotopologues(
        &self,
        composition: &ElementalComposition,
        isotope_threshold: f64,
        overall_threshold: f64,
    ) -> Result<Vec<Isotopologue>, EnvelopeError>;
}

/// Multinomial isotopologue enumeration over natural isotope abundances.
#[derive(Clone, Copy, Debug)]
pub struct IsotopologueEnumerator {
    /// Upper bound on reported variants, the most abundant are kept.
    pub max_results: usize,
}

impl Default for IsotopologueEnumerator {
    fn default() -> Self {
        IsotopologueEnumerator { max_results: 10_000 }
    }
}

// (isotope symbol, count) pairs of one element, with probability and mass
#[derive(Clone, Debug)]
struct ElementVariant {
    atoms: Vec<(String, i32)>,
    probability: f64,
    mass: f64,
}

/// split `n` atoms over `k` isotopes in every possible way
///
/// Arguments:
///
/// * `n` - number of atoms
/// * `k` - number of isotopes
///
/// Returns:
///
/// * `Vec<Vec<u32>>` - per isotope atom counts, each summing to `n`
///
fn distribute(n: u32, k: usize) -> Vec<Vec<u32>> {
    if k == 1 {
        return vec![vec![n]];
    }
    let mut result = Vec::new();
    for first in (0..=n).rev() {
        for mut rest in distribute(n - first, k - 1) {
            rest.insert(0, first);
            result.push(rest);
        }
    }
    result
}

/// isotope variants of `count` atoms of `element` with their multinomial probability
///
/// Arguments:
///
/// * `element` - element symbol without isotope label
/// * `count` - number of atoms
/// * `isotope_threshold` - minimum natural abundance of a substituted isotope
/// * `overall_threshold` - minimum probability of a returned variant
///
/// Returns:
///
/// * `Vec<ElementVariant>` - variants sorted by descending probability
///
fn element_variants(
    element: &str,
    count: u32,
    isotope_threshold: f64,
    overall_threshold: f64,
) -> Result<Vec<ElementVariant>, EnvelopeError> {
    let table = isotopes(element).ok_or_else(|| EnvelopeError::UnknownElement(element.to_string()))?;
    let dominant = most_abundant(element).map(|isotope| isotope.mass_number);
    let candidates: Vec<_> = table
        .iter()
        .filter(|isotope| isotope.abundance >= isotope_threshold || Some(isotope.mass_number) == dominant)
        .collect();

    let ln_n = ln_factorial(count as u64);
    let mut variants: Vec<ElementVariant> = distribute(count, candidates.len())
        .into_iter()
        .filter_map(|counts| {
            let ln_probability = counts
                .iter()
                .zip(candidates.iter())
                .fold(ln_n, |acc, (&k, isotope)| {
                    acc - ln_factorial(k as u64) + k as f64 * isotope.abundance.ln()
                });
            let probability = ln_probability.exp();
            if probability < overall_threshold {
                return None;
            }
            let mass = counts
                .iter()
                .zip(candidates.iter())
                .map(|(&k, isotope)| k as f64 * isotope.mass)
                .sum();
            let atoms = counts
                .iter()
                .zip(candidates.iter())
                .filter(|&(&k, _)| k > 0)
                .map(|(&k, isotope)| (isotope_symbol(element, isotope.mass_number), k as i32))
                .collect();
            Some(ElementVariant { atoms, probability, mass })
        })
        .collect();

    variants.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    Ok(variants)
}

impl IsotopologueSource for IsotopologueEnumerator {
    fn isotopologues(
        &self,
        composition: &ElementalComposition,
        isotope_threshold: f64,
        overall_threshold: f64,
    ) -> Result<Vec<Isotopologue>, EnvelopeError> {
        // fixed part: labelled atoms and the charge carrier
        let mut fixed = ElementalComposition::new();
        let mut fixed_mass = 0.0;
        let mut per_element = Vec::new();

        for (atom, count) in composition.iter() {
            // the charge carrier may be negative, atoms may not
            if atom == CHARGE_CARRIER {
                fixed.set_charge(count);
                continue;
            }
            if count < 0 {
                return Err(EnvelopeError::NegativeCount { atom: atom.to_string(), count });
            }
            match split_isotope_label(atom) {
                (_, Some(_)) => {
                    let mass = isotope_mass(atom).ok_or_else(|| EnvelopeError::UnknownElement(atom.to_string()))?;
                    fixed.add_atom(atom, count);
                    fixed_mass += mass * count as f64;
                }
                (element, None) => {
                    per_element.push(element_variants(element, count as u32, isotope_threshold, overall_threshold)?);
                }
            }
        }

        if per_element.is_empty() && fixed.iter().all(|(atom, _)| atom == CHARGE_CARRIER) {
            return Err(EnvelopeError::EmptyComposition);
        }

        let mut partial: Vec<(ElementalComposition, f64, f64)> = vec![(fixed, 1.0, fixed_mass)];
        for variants in per_element {
            let mut next = Vec::with_capacity(partial.len());
            for (base, probability, mass) in &partial {
                for variant in &variants {
                    let combined = probability * variant.probability;
                    // variants are sorted, everything after is rarer still
                    if combined < overall_threshold {
                        break;
                    }
                    let mut extended = base.clone();
                    for (symbol, count) in &variant.atoms {
                        extended.add_atom(symbol, *count);
                    }
                    next.push((extended, combined, mass + variant.mass));
                }
            }
            partial = next;
        }

        partial.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.total_cmp(&b.2)));
        partial.truncate(self.max_results);
        trace!("Enumerated {} isotopologues of {}", partial.len(), composition);

        Ok(partial
            .into_iter()
            .map(|(composition, abundance, _)| Isotopologue { composition, abundance })
            .collect())
    }
}
