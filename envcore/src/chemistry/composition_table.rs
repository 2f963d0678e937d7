use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use log::{debug, warn};

use crate::chemistry::composition::ElementalComposition;
use crate::chemistry::constants::{C_TERM, MODIFICATION, N_TERM};
use crate::error::CompositionError;

const HEADER_TAG: &str = "H";
const RESIDUE_TAG: &str = "R";

/// What to compute a mass for, a sequence resolved through the table or a ready composition.
#[derive(Clone, Copy, Debug)]
pub enum MassQuery<'a> {
    Sequence(&'a str),
    Composition(&'a ElementalComposition),
}

/// Read-only mapping from residue symbols to their elemental composition.
///
/// Besides single letter residues a table holds the terminal groups `N_term`
/// and `C_term`, and modification deltas such as `*`.
#[derive(Clone, Debug)]
pub struct CompositionTable {
    compositions: HashMap<String, ElementalComposition>,
}

impl CompositionTable {
    /// Load a tab delimited composition table from disk.
    ///
    /// Any malformed line aborts the load, a partial table is never returned.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CompositionError> {
        let path = path.as_ref();
        debug!("Reading composition table {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, CompositionError> {
        let mut header: Option<Vec<String>> = None;
        let mut compositions = HashMap::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;

            let cells: Vec<&str> = line
                .split('\t')
                .map(str::trim)
                .take_while(|cell| !cell.starts_with(';'))
                .collect();

            let Some((tag, mut fields)) = cells.split_first() else {
                continue;
            };
            if fields.iter().all(|field| field.is_empty()) || fields[0].starts_with('#') {
                continue;
            }

            match *tag {
                HEADER_TAG => {
                    header = Some(
                        fields
                            .iter()
                            .filter(|field| !field.is_empty())
                            .map(|field| field.to_string())
                            .collect(),
                    );
                }
                RESIDUE_TAG => {
                    let columns = header
                        .as_ref()
                        .ok_or(CompositionError::MissingHeader { line: line_number })?;
                    // blank cells past the last declared column are padding
                    while fields.len() > columns.len() && fields.last().is_some_and(|field| field.is_empty()) {
                        fields = &fields[..fields.len() - 1];
                    }
                    if fields.len() != columns.len() {
                        return Err(CompositionError::ColumnCount {
                            line: line_number,
                            expected: columns.len(),
                            found: fields.len(),
                        });
                    }
                    let symbol = fields[0];
                    if symbol.is_empty() {
                        return Err(CompositionError::MissingSymbol { line: line_number });
                    }

                    let mut composition = ElementalComposition::new();
                    for (atom, cell) in columns.iter().skip(1).zip(fields.iter().skip(1)) {
                        if cell.is_empty() {
                            continue;
                        }
                        let count = cell.parse::<i32>().map_err(|_| CompositionError::InvalidCount {
                            line: line_number,
                            value: cell.to_string(),
                        })?;
                        composition.add_atom(atom, count);
                    }

                    if compositions.insert(symbol.to_string(), composition).is_some() {
                        warn!("Residue {:?} redefined on line {}, keeping the later record", symbol, line_number);
                    }
                }
                _ => {}
            }
        }

        debug!("Loaded {} residue compositions", compositions.len());
        Ok(CompositionTable { compositions })
    }

    pub fn residue(&self, symbol: &str) -> Option<&ElementalComposition> {
        self.compositions.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.compositions.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.compositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compositions.is_empty()
    }

    fn lookup(&self, symbol: &str) -> Result<&ElementalComposition, CompositionError> {
        self.residue(symbol)
            .ok_or_else(|| CompositionError::UnknownResidue(symbol.to_string()))
    }

    /// Elemental composition of a sequence.
    ///
    /// Every character is looked up on its own, so a modification symbol adds
    /// its delta once per occurrence. `H+` is set to `charge` unless it is zero.
    ///
    /// # Arguments
    ///
    /// * `sequence` - residue symbols, e.g. `PEPT*IDE`
    /// * `charge` - proton charge of the peptide ion
    /// * `include_n_term` - add the `N_term` group
    /// * `include_c_term` - add the `C_term` group
    ///
    /// # Example
    ///
    /// ```
    /// use envcore::chemistry::composition_table::CompositionTable;
    ///
    /// let table = CompositionTable::default();
    /// let composition = table.get_composition("G", 1, true, true).unwrap();
    /// assert_eq!(composition.get("C"), 2);
    /// assert_eq!(composition.get("H"), 5);
    /// assert_eq!(composition.get("H+"), 1);
    /// ```
    pub fn get_composition(
        &self,
        sequence: &str,
        charge: i32,
        include_n_term: bool,
        include_c_term: bool,
    ) -> Result<ElementalComposition, CompositionError> {
        let mut composition = ElementalComposition::new();
        let mut buffer = [0u8; 4];
        for residue in sequence.chars() {
            composition += self.lookup(residue.encode_utf8(&mut buffer))?;
        }

        if include_n_term {
            composition += self.lookup(N_TERM)?;
        }
        if include_c_term {
            composition += self.lookup(C_TERM)?;
        }

        if charge != 0 {
            composition.set_charge(charge);
        }

        Ok(composition)
    }

    /// Summed delta of `count` modifications, without terminal groups.
    pub fn modification_delta(&self, count: usize) -> Result<ElementalComposition, CompositionError> {
        if count == 0 {
            return Ok(ElementalComposition::new());
        }
        Ok(self.lookup(MODIFICATION)?.scaled(count as i32))
    }

    /// Mass of a sequence or of a composition.
    ///
    /// A sequence is resolved with both terminal groups at `charge` (zero when `None`).
    /// For a composition, `Some(charge)` replaces its `H+` count before summation.
    ///
    /// # Example
    ///
    /// ```
    /// use envcore::chemistry::composition_table::{CompositionTable, MassQuery};
    ///
    /// let table = CompositionTable::default();
    /// let neutral = table.get_mass(MassQuery::Sequence("G"), None).unwrap();
    /// let charged = table.get_mass(MassQuery::Sequence("G"), Some(1)).unwrap();
    /// assert!((charged - neutral - 1.00783).abs() < 1e-9);
    /// ```
    pub fn get_mass(&self, query: MassQuery<'_>, charge: Option<i32>) -> Result<f64, CompositionError> {
        match query {
            MassQuery::Sequence(sequence) => self
                .get_composition(sequence, charge.unwrap_or(0), true, true)?
                .monoisotopic_mass(),
            MassQuery::Composition(composition) => match charge {
                Some(charge) => {
                    let mut charged = composition.clone();
                    charged.set_charge(charge);
                    charged.monoisotopic_mass()
                }
                None => composition.monoisotopic_mass(),
            },
        }
    }
}

impl FromStr for CompositionTable {
    type Err = CompositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_reader(s.as_bytes())
    }
}

impl Default for CompositionTable {
    /// Standard residues, Selenocysteine, terminal groups and the citrullination
    /// delta `*` (R to citrulline, `-NH +O`).
    fn default() -> Self {
        let residues: [(&str, &[(&str, i32)]); 24] = [
            ("A", &[("C", 3), ("H", 5), ("O", 1), ("N", 1)]),
            ("C", &[("C", 5), ("H", 8), ("O", 2), ("N", 2), ("S", 1)]),
            ("D", &[("C", 4), ("H", 5), ("O", 3), ("N", 1)]),
            ("E", &[("C", 5), ("H", 7), ("O", 3), ("N", 1)]),
            ("F", &[("C", 9), ("H", 9), ("O", 1), ("N", 1)]),
            ("G", &[("C", 2), ("H", 3), ("O", 1), ("N", 1)]),
            ("H", &[("C", 6), ("H", 7), ("O", 1), ("N", 3)]),
            ("I", &[("C", 6), ("H", 11), ("O", 1), ("N", 1)]),
            ("K", &[("C", 6), ("H", 12), ("O", 1), ("N", 2)]),
            ("L", &[("C", 6), ("H", 11), ("O", 1), ("N", 1)]),
            ("M", &[("C", 5), ("H", 9), ("O", 1), ("N", 1), ("S", 1)]),
            ("N", &[("C", 4), ("H", 6), ("O", 2), ("N", 2)]),
            ("P", &[("C", 5), ("H", 7), ("O", 1), ("N", 1)]),
            ("Q", &[("C", 5), ("H", 8), ("O", 2), ("N", 2)]),
            ("R", &[("C", 6), ("H", 12), ("O", 1), ("N", 4)]),
            ("S", &[("C", 3), ("H", 5), ("O", 2), ("N", 1)]),
            ("T", &[("C", 4), ("H", 7), ("O", 2), ("N", 1)]),
            ("V", &[("C", 5), ("H", 9), ("O", 1), ("N", 1)]),
            ("W", &[("C", 11), ("H", 10), ("O", 1), ("N", 2)]),
            ("Y", &[("C", 9), ("H", 9), ("O", 2), ("N", 1)]),
            ("U", &[("C", 5), ("H", 8), ("O", 2), ("N", 2), ("Se", 1)]),
            (C_TERM, &[("H", 1), ("O", 1)]),
            (N_TERM, &[("H", 1)]),
            (MODIFICATION, &[("H", -1), ("O", 1), ("N", -1)]),
        ];

        let compositions = residues
            .iter()
            .map(|(symbol, atoms)| (symbol.to_string(), atoms.iter().copied().collect()))
            .collect();

        CompositionTable { compositions }
    }
}
