// Purpose: To store constants that are used in the program
pub const MASS_PROTON: f64 = 1.007276466621; // Unified atomic mass unit
pub const MASS_NEUTRON: f64 = 1.00866491595; // Unified atomic mass unit

// Reserved residue symbols of a composition table
pub const N_TERM: &str = "N_term";
pub const C_TERM: &str = "C_term";
pub const MODIFICATION: &str = "*";

// Charge carrier key of an elemental composition
pub const CHARGE_CARRIER: &str = "H+";

// Per-isotope abundance floor used when enumerating isotopologues
pub const ISOTOPE_THRESHOLD: f64 = 5e-3;
pub const DEFAULT_ABUNDANCE_THRESHOLD: f64 = 1e-3;
pub const DEFAULT_MASS_DEFECT_MATCH_RANGE: f64 = 0.05;
pub const DEFAULT_ENV_CUTOFF: f64 = 0.8;

/// Monoisotopic masses used for composition mass calculation.
///
/// # Arguments
///
/// * `atom` - atom symbol as it appears in a composition table header
///
/// # Returns
///
/// * `Option<f64>` - the fixed mass of the atom, `None` if the atom is not tabulated
///
/// # Example
///
/// ```
/// use envcore::chemistry::constants::atomic_mass;
///
/// assert_eq!(atomic_mass("C"), Some(12.0));
/// assert_eq!(atomic_mass("H+"), Some(1.00783));
/// assert_eq!(atomic_mass("Xe"), None);
/// ```
pub fn atomic_mass(atom: &str) -> Option<f64> {
    let mass = match atom {
        "C" => 12.0,
        "H" => 1.00783,
        "H+" => 1.00783,
        "O" => 15.99491,
        "N" => 14.00307,
        "S" => 31.97207,
        "P" => 30.97376,
        "N[15]" => 15.00011,
        "H[2]" => 2.0141,
        "C[13]" => 13.00335,
        "Se" => 79.91652,
        "Cl" => 34.96885,
        "Br" => 78.91834,
        _ => return None,
    };
    Some(mass)
}
