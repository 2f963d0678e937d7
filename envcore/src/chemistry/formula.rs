use std::sync::LazyLock;

use regex::Regex;

use crate::chemistry::composition::ElementalComposition;
use crate::chemistry::elements::isotope_symbol;
use crate::error::CompositionError;

static FORMULA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(?:\(\d+\))?[A-Z][a-z]?\d*)+$").expect("formula pattern compiles"));
static ATOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\((\d+)\))?([A-Z][a-z]?)(\d+)?").expect("atom pattern compiles"));

/// Parse a sum formula into an elemental composition.
///
/// Isotope labels precede the element in parentheses, `(15)N2` is two `N[15]`.
/// A missing count means one atom.
///
/// # Example
///
/// ```
/// use envcore::chemistry::formula::parse_formula;
///
/// let composition = parse_formula("C10(2)H3(15)N2O").unwrap();
/// assert_eq!(composition.get("C"), 10);
/// assert_eq!(composition.get("H[2]"), 3);
/// assert_eq!(composition.get("N[15]"), 2);
/// assert_eq!(composition.get("O"), 1);
/// ```
pub fn parse_formula(formula: &str) -> Result<ElementalComposition, CompositionError> {
    let formula = formula.trim();
    if !FORMULA.is_match(formula) {
        return Err(CompositionError::InvalidFormula(formula.to_string()));
    }

    let mut composition = ElementalComposition::new();
    for captures in ATOM.captures_iter(formula) {
        let element = &captures[2];
        let count = match captures.get(3) {
            Some(count) => count
                .as_str()
                .parse::<i32>()
                .map_err(|_| CompositionError::InvalidFormula(formula.to_string()))?,
            None => 1,
        };
        match captures.get(1) {
            Some(label) => {
                let mass_number = label
                    .as_str()
                    .parse::<u16>()
                    .map_err(|_| CompositionError::InvalidFormula(formula.to_string()))?;
                composition.add_atom(&isotope_symbol(element, mass_number), count);
            }
            None => composition.add_atom(element, count),
        }
    }

    Ok(composition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_elements_accumulate() {
        let composition = parse_formula("CH3CH2OH").unwrap();
        assert_eq!(composition.get("C"), 2);
        assert_eq!(composition.get("H"), 6);
        assert_eq!(composition.get("O"), 1);
    }

    #[test]
    fn test_isotope_labels() {
        let composition = parse_formula("C4(13)C2H12(15)N2(2)HO").unwrap();
        assert_eq!(composition.get("C"), 4);
        assert_eq!(composition.get("C[13]"), 2);
        assert_eq!(composition.get("N[15]"), 2);
        assert_eq!(composition.get("N"), 0);
        assert_eq!(composition.get("H"), 12);
        assert_eq!(composition.get("H[2]"), 1);
        assert_eq!(composition.get("O"), 1);

        let mass = composition.monoisotopic_mass().unwrap();
        let expected = 4.0 * 12.0 + 2.0 * 13.00335 + 12.0 * 1.00783 + 2.0 * 15.00011 + 2.0141 + 15.99491;
        assert!((mass - expected).abs() < 1e-9);

        // a label must precede its element
        assert!(parse_formula("C10H(2)3").is_err());
    }

    #[test]
    fn test_invalid_formulas() {
        for formula in ["", "c2H4", "C2-H4", "(13)", "C2 H4"] {
            assert!(
                matches!(parse_formula(formula), Err(CompositionError::InvalidFormula(_))),
                "{:?} should not parse",
                formula
            );
        }
    }

    #[test]
    fn test_formula_mass_matches_table() {
        let composition = parse_formula("C2H5NO2").unwrap();
        let mass = composition.monoisotopic_mass().unwrap();
        let expected = 2.0 * 12.0 + 5.0 * 1.00783 + 14.00307 + 2.0 * 15.99491;
        assert!((mass - expected).abs() < 1e-9);
    }
}
