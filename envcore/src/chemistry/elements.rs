/// A single stable isotope of an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Isotope {
    pub mass_number: u16,
    pub mass: f64,
    pub abundance: f64,
}

const fn iso(mass_number: u16, mass: f64, abundance: f64) -> Isotope {
    Isotope { mass_number, mass, abundance }
}

const HYDROGEN: [Isotope; 2] = [iso(1, 1.00782503207, 0.999885), iso(2, 2.0141017778, 0.000115)];
const CARBON: [Isotope; 2] = [iso(12, 12.0, 0.9893), iso(13, 13.0033548378, 0.0107)];
const NITROGEN: [Isotope; 2] = [iso(14, 14.0030740048, 0.99636), iso(15, 15.0001088982, 0.00364)];
const OXYGEN: [Isotope; 3] = [
    iso(16, 15.99491461956, 0.99757),
    iso(17, 16.99913170, 0.00038),
    iso(18, 17.9991610, 0.00205),
];
const FLUORINE: [Isotope; 1] = [iso(19, 18.99840322, 1.0)];
const SODIUM: [Isotope; 1] = [iso(23, 22.9897692809, 1.0)];
const PHOSPHORUS: [Isotope; 1] = [iso(31, 30.97376163, 1.0)];
const SULFUR: [Isotope; 4] = [
    iso(32, 31.97207100, 0.9499),
    iso(33, 32.97145876, 0.0075),
    iso(34, 33.96786690, 0.0425),
    iso(36, 35.96708076, 0.0001),
];
const CHLORINE: [Isotope; 2] = [iso(35, 34.96885268, 0.7576), iso(37, 36.96590259, 0.2424)];
const POTASSIUM: [Isotope; 3] = [
    iso(39, 38.96370668, 0.932581),
    iso(40, 39.96399848, 0.000117),
    iso(41, 40.96182576, 0.067302),
];
const SELENIUM: [Isotope; 6] = [
    iso(74, 73.9224764, 0.0089),
    iso(76, 75.9192136, 0.0937),
    iso(77, 76.9199140, 0.0763),
    iso(78, 77.9173091, 0.2377),
    iso(80, 79.9165213, 0.4961),
    iso(82, 81.9166994, 0.0873),
];
const BROMINE: [Isotope; 2] = [iso(79, 78.9183371, 0.5069), iso(81, 80.9162906, 0.4931)];
const IODINE: [Isotope; 1] = [iso(127, 126.904473, 1.0)];

/// Natural isotopes of an element, ordered by mass number.
///
/// # Example
///
/// ```
/// use envcore::chemistry::elements::isotopes;
///
/// let carbon = isotopes("C").unwrap();
/// assert_eq!(carbon.len(), 2);
/// assert_eq!(carbon[1].mass_number, 13);
/// assert!(isotopes("Xx").is_none());
/// ```
pub fn isotopes(element: &str) -> Option<&'static [Isotope]> {
    let table: &'static [Isotope] = match element {
        "H" => &HYDROGEN,
        "C" => &CARBON,
        "N" => &NITROGEN,
        "O" => &OXYGEN,
        "F" => &FLUORINE,
        "Na" => &SODIUM,
        "P" => &PHOSPHORUS,
        "S" => &SULFUR,
        "Cl" => &CHLORINE,
        "K" => &POTASSIUM,
        "Se" => &SELENIUM,
        "Br" => &BROMINE,
        "I" => &IODINE,
        _ => return None,
    };
    Some(table)
}

/// The most abundant isotope of an element.
pub fn most_abundant(element: &str) -> Option<&'static Isotope> {
    isotopes(element)?
        .iter()
        .max_by(|a, b| a.abundance.total_cmp(&b.abundance))
}

/// Split an atom symbol into its element and optional isotope label.
///
/// # Example
///
/// ```
/// use envcore::chemistry::elements::split_isotope_label;
///
/// assert_eq!(split_isotope_label("N[15]"), ("N", Some(15)));
/// assert_eq!(split_isotope_label("Se"), ("Se", None));
/// ```
pub fn split_isotope_label(symbol: &str) -> (&str, Option<u16>) {
    if let Some(open) = symbol.find('[') {
        if let Some(label) = symbol[open + 1..].strip_suffix(']') {
            if let Ok(mass_number) = label.parse::<u16>() {
                return (&symbol[..open], Some(mass_number));
            }
        }
    }
    (symbol, None)
}

/// Exact mass of an atom symbol. Unlabelled symbols resolve to the most
/// abundant isotope.
///
/// # Example
///
/// ```
/// use envcore::chemistry::elements::isotope_mass;
///
/// assert_eq!(isotope_mass("C[13]"), Some(13.0033548378));
/// assert_eq!(isotope_mass("C"), Some(12.0));
/// assert_eq!(isotope_mass("C[14]"), None);
/// ```
pub fn isotope_mass(symbol: &str) -> Option<f64> {
    match split_isotope_label(symbol) {
        (element, Some(mass_number)) => isotopes(element)?
            .iter()
            .find(|isotope| isotope.mass_number == mass_number)
            .map(|isotope| isotope.mass),
        (element, None) => most_abundant(element).map(|isotope| isotope.mass),
    }
}

/// Build the symbol of an explicit isotope, e.g. `C[13]`.
pub fn isotope_symbol(element: &str, mass_number: u16) -> String {
    format!("{}[{}]", element, mass_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abundances_sum_to_one() {
        for element in ["H", "C", "N", "O", "S", "Cl", "Se", "Br"] {
            let total: f64 = isotopes(element).unwrap().iter().map(|i| i.abundance).sum();
            assert!((total - 1.0).abs() < 1e-3, "{} sums to {}", element, total);
        }
    }

    #[test]
    fn test_most_abundant_selenium() {
        assert_eq!(most_abundant("Se").unwrap().mass_number, 80);
    }

    #[test]
    fn test_malformed_label_is_plain_symbol() {
        assert_eq!(split_isotope_label("C[x]"), ("C[x]", None));
        assert_eq!(isotope_mass("C[x]"), None);
    }
}
