//! Error types for specification resolution.

use st7_expr::EvalError;
use st7_model::ModelError;

/// Errors that can occur while resolving a setup.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The model cannot be resolved as written: an unknown set, an
    /// undeclared spec, a timing set without a period.
    #[error("parse inconsistency: {0}")]
    ParseInconsistency(#[from] ModelError),

    /// A spec declared by an equation set has no value in the spec set.
    #[error("spec '{spec}' declared by EQNSET {eqnset} is missing from SPECSET {specset}")]
    MissingSpec {
        /// The declared spec name.
        spec: String,
        /// The equation set declaring it.
        eqnset: u32,
        /// Number of the spec set within the equation set.
        specset: u32,
    },

    /// A port spec has neither a local nor a global value.
    #[error("spec '{spec}' of port '{port}' has no local or global value in SPECIFICATION {specification}")]
    UnresolvedGlobalSpec {
        spec: String,
        port: String,
        specification: String,
    },

    /// An expression failed to evaluate.
    #[error("cannot evaluate {context}")]
    Eval {
        /// What was being evaluated (equation, setting, edge).
        context: String,
        #[source]
        source: EvalError,
    },

    /// A built-in pattern failed to compile.
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

impl ResolveError {
    /// Whether the caller may skip the offending setup and carry on.
    ///
    /// Parse inconsistencies mean the model itself is broken and abort the
    /// run; everything tied to a single identifier only spoils one setup.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolveError::MissingSpec { .. }
                | ResolveError::UnresolvedGlobalSpec { .. }
                | ResolveError::Eval { .. }
        )
    }
}

pub(crate) fn inconsistent(detail: impl Into<String>) -> ResolveError {
    ResolveError::ParseInconsistency(ModelError::Inconsistent {
        detail: detail.into(),
    })
}

/// Result type for resolution.
pub type Result<T> = std::result::Result<T, ResolveError>;
