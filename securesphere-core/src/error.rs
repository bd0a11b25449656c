/// Structured error types for securesphere-core.
///
/// Library consumers get `SphereError`; the binary wraps it in `anyhow`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for securesphere-core operations
#[derive(Error, Debug)]
pub enum SphereError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// CSV reader rejected a record
    #[error("CSV error in questionnaire: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    /// The questionnaire file is structurally wrong
    #[error("Invalid questionnaire at row {row}: {reason}")]
    Catalog { row: usize, reason: String },

    /// Questionnaire contained no questions
    #[error("Questionnaire {path:?} contains no questions")]
    EmptyCatalog { path: PathBuf },

    /// Answer is not one of the question's options
    #[error("'{answer}' is not an option of question '{question}'")]
    UnknownOption { question: String, answer: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for securesphere-core operations
pub type Result<T> = std::result::Result<T, SphereError>;

impl SphereError {
    /// Create a catalog format error at a 1-based data row
    pub fn catalog(row: usize, reason: impl Into<String>) -> Self {
        Self::Catalog {
            row,
            reason: reason.into(),
        }
    }

    /// Create an unknown option error
    pub fn unknown_option(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self::UnknownOption {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
