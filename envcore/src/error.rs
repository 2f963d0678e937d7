use thiserror::Error;

/// Failures while loading a composition table or resolving a composition from it.
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("failed to read composition table: {0}")]
    Io(#[from] std::io::Error),
    #[error("badly formed composition table: residue record on line {line} precedes any header")]
    MissingHeader { line: usize },
    #[error("badly formed composition table: line {line} has {found} columns, header declares {expected}")]
    ColumnCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("badly formed composition table: residue record on line {line} has no symbol")]
    MissingSymbol { line: usize },
    #[error("badly formed composition table: line {line} has non-integer count {value:?}")]
    InvalidCount { line: usize, value: String },
    #[error("unknown residue symbol {0:?}")]
    UnknownResidue(String),
    #[error("no atomic mass for atom {0:?}")]
    UnknownAtom(String),
    #[error("invalid formula {0:?}")]
    InvalidFormula(String),
}

/// Failures while enumerating isotopologues or building an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("cannot enumerate isotopologues of negative atom count {count} for {atom:?}")]
    NegativeCount { atom: String, count: i32 },
    #[error("no isotope data for element {0:?}")]
    UnknownElement(String),
    #[error("composition contains no atoms")]
    EmptyComposition,
}

/// Failures of the consensus matcher configuration or anchoring.
#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("{0:?} is an invalid tolerance unit, expected `th` or `ppm`")]
    InvalidToleranceUnit(String),
    #[error("{0:?} is an invalid tie-break policy, expected `intensity` or `mz`")]
    InvalidTieBreak(String),
    #[error("no theoretical peak within tolerance of monoisotopic m/z {mz}")]
    MonoNotFound { mz: f64 },
    #[error("{count} theoretical peaks within tolerance of monoisotopic m/z {mz}")]
    AmbiguousMono { mz: f64, count: usize },
}
