//! Error types for fuzzy-coevo
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Error type for genome operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenomeError {
    /// Genome length does not match the layout implied by the parameters
    #[error("Genome length mismatch: expected {expected} bits, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Bit access outside the genome
    #[error("Bit index {index} out of range for genome of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A field wider than the supported word size was requested
    #[error("Field of {0} bits exceeds the 64-bit decode limit")]
    FieldTooWide(usize),

    /// Crossover point outside the valid [1, len-1] range
    #[error("Crossover point {point} invalid for genomes of length {len}")]
    InvalidCrossoverPoint { point: usize, len: usize },
}

/// Error type for fuzzy inference
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FuzzyError {
    /// Defuzzification over a flat-zero membership surface
    #[error("Degenerate system: output variable {0} has no activated set")]
    DegenerateSystem(usize),

    /// A rule or decode referenced a variable that does not exist
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A rule referenced a set that does not exist on its variable
    #[error("Unknown set {set} on variable {variable}")]
    UnknownSet { variable: String, set: String },
}

/// Error type for dataset loading
#[derive(Debug, Error)]
pub enum DatasetError {
    /// IO error while reading the file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The file held no header or no sample rows
    #[error("Dataset is empty: {0}")]
    Empty(String),

    /// A row had fewer columns than the header
    #[error("Row {row} has {actual} columns, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// The declared output count leaves no input columns
    #[error("Dataset has {columns} data columns but {outputs} outputs were requested")]
    TooFewColumns { columns: usize, outputs: usize },
}

/// Error type for persisted-system files
#[derive(Debug, Error)]
pub enum PersistError {
    /// IO error while reading or writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A required element was missing
    #[error("Missing element: {0}")]
    MissingElement(&'static str),

    /// An element held text that failed to parse
    #[error("Invalid value in <{element}>: {text}")]
    InvalidValue { element: &'static str, text: String },
}

/// Top-level error type for evolution operations
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// Genome error
    #[error("Genome error: {0}")]
    Genome(#[from] GenomeError),

    /// Fuzzy inference error
    #[error("Fuzzy error: {0}")]
    Fuzzy(#[from] FuzzyError),

    /// Dataset error
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Persistence error
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Empty population
    #[error("Empty population")]
    EmptyPopulation,

    /// A worker thread panicked or disappeared
    #[error("Worker failure: {0}")]
    Worker(String),
}

/// Result type alias for evolution operations
pub type CoevResult<T> = Result<T, EvolutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genome_error_display() {
        let err = GenomeError::LengthMismatch {
            expected: 120,
            actual: 80,
        };
        assert_eq!(
            err.to_string(),
            "Genome length mismatch: expected 120 bits, got 80"
        );

        let err = GenomeError::IndexOutOfRange { index: 9, len: 8 };
        assert_eq!(
            err.to_string(),
            "Bit index 9 out of range for genome of length 8"
        );
    }

    #[test]
    fn test_fuzzy_error_display() {
        let err = FuzzyError::DegenerateSystem(1);
        assert_eq!(
            err.to_string(),
            "Degenerate system: output variable 1 has no activated set"
        );
    }

    #[test]
    fn test_evolution_error_from_genome_error() {
        let genome_err = GenomeError::FieldTooWide(70);
        let evo_err: EvolutionError = genome_err.into();
        assert!(matches!(evo_err, EvolutionError::Genome(_)));
    }

    #[test]
    fn test_evolution_error_from_fuzzy_error() {
        let fuzzy_err = FuzzyError::UnknownVariable("pressure".to_string());
        let evo_err: EvolutionError = fuzzy_err.into();
        assert!(matches!(evo_err, EvolutionError::Fuzzy(_)));
    }
}
