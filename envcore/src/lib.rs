// chemistry module
pub mod chemistry {
    pub mod constants;
    pub mod elements;
    pub mod composition;
    pub mod composition_table;
    pub mod formula;
}

// algorithm module
pub mod algorithm {
    pub mod utility;
    pub mod isotope;
    pub mod envelope;
    pub mod consensus;
}

// data module
pub mod data {
    pub mod spectrum;
    pub mod tolerance;
}

pub mod error;
