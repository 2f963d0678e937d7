use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::chemistry::constants::{atomic_mass, CHARGE_CARRIER, MASS_PROTON};
use crate::chemistry::elements::isotope_mass;
use crate::error::{CompositionError, EnvelopeError};

/// Signed atom counts of a molecule, peptide or composition delta.
///
/// Keys are atom symbols as used by composition tables (`C`, `H`, `N[15]`)
/// plus the charge carrier `H+`. Zero counts are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementalComposition {
    atoms: BTreeMap<String, i32>,
}

impl ElementalComposition {
    pub fn new() -> Self {
        ElementalComposition { atoms: BTreeMap::new() }
    }

    /// Count of `atom`, zero if absent.
    pub fn get(&self, atom: &str) -> i32 {
        self.atoms.get(atom).copied().unwrap_or(0)
    }

    /// Overwrite the count of `atom`.
    ///
    /// # Example
    ///
    /// ```
    /// use envcore::chemistry::composition::ElementalComposition;
    ///
    /// let mut composition = ElementalComposition::new();
    /// composition.set("C", 2);
    /// assert_eq!(composition.get("C"), 2);
    /// composition.set("C", 0);
    /// assert!(composition.is_empty());
    /// ```
    pub fn set(&mut self, atom: &str, count: i32) {
        if count == 0 {
            self.atoms.remove(atom);
        } else {
            self.atoms.insert(atom.to_string(), count);
        }
    }

    /// Add `count` (possibly negative) to the count of `atom`.
    pub fn add_atom(&mut self, atom: &str, count: i32) {
        let updated = self.get(atom) + count;
        self.set(atom, updated);
    }

    /// Net proton charge, the `H+` count.
    pub fn charge(&self) -> i32 {
        self.get(CHARGE_CARRIER)
    }

    pub fn set_charge(&mut self, charge: i32) {
        self.set(CHARGE_CARRIER, charge);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.atoms.iter().map(|(atom, count)| (atom.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// First atom with a negative count, if any.
    pub fn first_negative(&self) -> Option<(&str, i32)> {
        self.iter().find(|(_, count)| *count < 0)
    }

    /// Composition with every count multiplied by `factor`.
    pub fn scaled(&self, factor: i32) -> Self {
        self.iter().map(|(atom, count)| (atom, count * factor)).collect()
    }

    /// Mass from the fixed atomic-mass table, `H+` included at its tabulated mass.
    ///
    /// # Example
    ///
    /// ```
    /// use envcore::chemistry::composition::ElementalComposition;
    ///
    /// let water: ElementalComposition = [("H", 2), ("O", 1)].into_iter().collect();
    /// let mass = water.monoisotopic_mass().unwrap();
    /// assert!((mass - 18.01057).abs() < 1e-9);
    /// ```
    pub fn monoisotopic_mass(&self) -> Result<f64, CompositionError> {
        self.iter().try_fold(0.0, |acc, (atom, count)| {
            let mass = atomic_mass(atom).ok_or_else(|| CompositionError::UnknownAtom(atom.to_string()))?;
            Ok(acc + mass * count as f64)
        })
    }

    /// Isotope-resolved mass-to-charge ratio.
    ///
    /// Atoms resolve through the isotope table, so `C[13]` and `O[18]` are exact.
    /// The `H+` count is treated as the charge `z` and carried as protons:
    /// `(M + z * m_proton) / |z|`, or the neutral mass `M` when uncharged.
    pub fn exact_mz(&self) -> Result<f64, EnvelopeError> {
        let mut neutral = 0.0;
        for (atom, count) in self.iter().filter(|(atom, _)| *atom != CHARGE_CARRIER) {
            let mass = isotope_mass(atom).ok_or_else(|| EnvelopeError::UnknownElement(atom.to_string()))?;
            neutral += mass * count as f64;
        }
        let charge = self.charge();
        if charge == 0 {
            Ok(neutral)
        } else {
            Ok((neutral + charge as f64 * MASS_PROTON) / charge.abs() as f64)
        }
    }
}

impl<S: AsRef<str>> FromIterator<(S, i32)> for ElementalComposition {
    fn from_iter<I: IntoIterator<Item = (S, i32)>>(iter: I) -> Self {
        let mut composition = ElementalComposition::new();
        for (atom, count) in iter {
            composition.add_atom(atom.as_ref(), count);
        }
        composition
    }
}

impl AddAssign<&ElementalComposition> for ElementalComposition {
    fn add_assign(&mut self, rhs: &ElementalComposition) {
        for (atom, count) in rhs.iter() {
            self.add_atom(atom, count);
        }
    }
}

impl SubAssign<&ElementalComposition> for ElementalComposition {
    fn sub_assign(&mut self, rhs: &ElementalComposition) {
        for (atom, count) in rhs.iter() {
            self.add_atom(atom, -count);
        }
    }
}

impl Add<&ElementalComposition> for ElementalComposition {
    type Output = ElementalComposition;

    fn add(mut self, rhs: &ElementalComposition) -> Self::Output {
        self += rhs;
        self
    }
}

impl Sub<&ElementalComposition> for ElementalComposition {
    type Output = ElementalComposition;

    fn sub(mut self, rhs: &ElementalComposition) -> Self::Output {
        self -= rhs;
        self
    }
}

impl Display for ElementalComposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (atom, count) in self.iter() {
            write!(f, "{}{}", atom, count)?;
        }
        Ok(())
    }
}
