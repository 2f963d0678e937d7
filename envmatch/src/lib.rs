// src/lib.rs
pub mod cli;
pub mod config;
pub mod errors;

pub mod io {
    pub mod ms1;
    pub mod mzml;
    pub mod peptides;
    pub mod raw_file;
}

pub mod processing;
