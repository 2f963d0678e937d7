use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Unit of a matching tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceUnit {
    /// Absolute m/z window.
    Th,
    /// Window relative to the target m/z, in parts per million.
    Ppm,
}

impl FromStr for ToleranceUnit {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "th" => Ok(ToleranceUnit::Th),
            "ppm" => Ok(ToleranceUnit::Ppm),
            _ => Err(MatchError::InvalidToleranceUnit(s.to_string())),
        }
    }
}

impl Display for ToleranceUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ToleranceUnit::Th => write!(f, "th"),
            ToleranceUnit::Ppm => write!(f, "ppm"),
        }
    }
}

/// Symmetric m/z matching tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub value: f64,
    pub unit: ToleranceUnit,
}

impl Tolerance {
    pub fn new(value: f64, unit: ToleranceUnit) -> Self {
        Tolerance { value, unit }
    }

    pub fn th(value: f64) -> Self {
        Tolerance::new(value, ToleranceUnit::Th)
    }

    pub fn ppm(value: f64) -> Self {
        Tolerance::new(value, ToleranceUnit::Ppm)
    }

    /// Half width of the window around `target`.
    ///
    /// # Example
    ///
    /// ```
    /// use envcore::data::tolerance::Tolerance;
    ///
    /// assert_eq!(Tolerance::th(0.02).window(500.0), 0.02);
    /// assert!((Tolerance::ppm(50.0).window(500.0) - 0.025).abs() < 1e-12);
    /// ```
    pub fn window(&self, target: f64) -> f64 {
        match self.unit {
            ToleranceUnit::Th => self.value,
            ToleranceUnit::Ppm => self.value / 1e6 * target,
        }
    }

    /// (`lower`, `upper`) bounds of the window around `target`.
    pub fn bounds(&self, target: f64) -> (f64, f64) {
        let window = self.window(target);
        (target - window, target + window)
    }

    /// Whether `observed` lies within the window around `target`.
    pub fn contains(&self, target: f64, observed: f64) -> bool {
        (observed - target).abs() <= self.window(target)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::ppm(50.0)
    }
}

impl Display for Tolerance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// How to choose between several observed peaks inside one window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Highest intensity, larger m/z on equal intensity.
    #[default]
    Intensity,
    /// Largest m/z.
    Mz,
}

impl FromStr for TieBreak {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intensity" => Ok(TieBreak::Intensity),
            "mz" => Ok(TieBreak::Mz),
            _ => Err(MatchError::InvalidTieBreak(s.to_string())),
        }
    }
}

impl Display for TieBreak {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TieBreak::Intensity => write!(f, "intensity"),
            TieBreak::Mz => write!(f, "mz"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("th".parse::<ToleranceUnit>(), Ok(ToleranceUnit::Th));
        assert_eq!("ppm".parse::<ToleranceUnit>(), Ok(ToleranceUnit::Ppm));
        assert_eq!(
            "da".parse::<ToleranceUnit>(),
            Err(MatchError::InvalidToleranceUnit("da".to_string()))
        );
    }

    #[test]
    fn test_parse_tie_break() {
        assert_eq!("mz".parse::<TieBreak>(), Ok(TieBreak::Mz));
        assert!("closest".parse::<TieBreak>().is_err());
    }

    #[test]
    fn test_ppm_bounds() {
        let (lower, upper) = Tolerance::ppm(10.0).bounds(1000.0);
        assert!((lower - 999.99).abs() < 1e-9);
        assert!((upper - 1000.01).abs() < 1e-9);
    }

    #[test]
    fn test_contains_edges() {
        let tolerance = Tolerance::th(0.5);
        assert!(tolerance.contains(100.0, 100.5));
        assert!(tolerance.contains(100.0, 99.5));
        assert!(!tolerance.contains(100.0, 100.51));
    }
}
