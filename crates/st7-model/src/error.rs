//! Error types for data model construction.

/// Violations of the model's structural invariants.
///
/// These are parse inconsistencies: the input describes a model that cannot
/// exist (a key defined twice, a reference to something never defined).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A key was added twice to the same container.
    #[error("duplicate {kind} '{key}'")]
    Duplicate {
        /// Entity kind (e.g. "EQNSET").
        kind: &'static str,
        /// The repeated key.
        key: String,
    },

    /// A referenced key does not exist.
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Entity kind.
        kind: &'static str,
        /// The missing key.
        key: String,
    },

    /// Any other structural inconsistency.
    #[error("inconsistent model: {detail}")]
    Inconsistent {
        /// Description of the inconsistency.
        detail: String,
    },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
