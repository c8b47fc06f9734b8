//! Module for reading models and writing design results
pub mod json;
