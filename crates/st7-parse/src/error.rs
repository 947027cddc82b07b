//! Error types for file parsing.

use std::path::PathBuf;

use st7_model::ModelError;

use crate::context::Location;

/// Errors that can occur while reading a setup file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// I/O error reading a file.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A grammar regex failed to compile.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// The first line does not identify the expected file kind.
    #[error("{origin}: expected header '{expected}', found '{found}'")]
    Header {
        /// File name or `<input>`.
        origin: String,
        /// Description of the accepted header(s).
        expected: &'static str,
        /// The line actually found.
        found: String,
    },

    /// A line does not fit the grammar at its position.
    #[error("{location}: {detail}: {line}")]
    Syntax {
        location: Location,
        /// The offending line.
        line: String,
        /// What went wrong.
        detail: String,
    },

    /// A construct the parser recognizes but does not support.
    #[error("{location}: {construct} is not supported: {line}")]
    Unsupported {
        location: Location,
        line: String,
        /// The unsupported keyword.
        construct: String,
    },

    /// The line is well formed but contradicts the model built so far.
    #[error("{location}: {source}")]
    Model {
        location: Location,
        #[source]
        source: ModelError,
    },

    /// A path referenced from a master file cannot be resolved.
    #[error("cannot resolve '{path}' from {}: {detail}", base.display())]
    MasterPath {
        /// Directory of the master file.
        base: PathBuf,
        /// The referenced path as written.
        path: String,
        detail: String,
    },
}

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Read a file into a string, attaching the path to I/O errors.
pub(crate) fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}
