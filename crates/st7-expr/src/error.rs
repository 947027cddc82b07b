//! Error types for expression evaluation.

/// Errors that can occur while evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// An identifier is not present in the variable mapping.
    #[error("unresolved identifier '{name}' in expression '{expression}'")]
    UnresolvedIdentifier {
        /// The identifier that could not be resolved.
        name: String,
        /// The full expression text.
        expression: String,
    },

    /// The expression does not match the grammar.
    #[error("syntax error in expression '{expression}' at offset {position}: {detail}")]
    Syntax {
        /// The full expression text.
        expression: String,
        /// Byte offset of the offending token.
        position: usize,
        /// Description of what was expected.
        detail: String,
    },

    /// A division whose divisor evaluated to zero.
    #[error("division by zero in expression '{expression}'")]
    DivisionByZero {
        /// The full expression text.
        expression: String,
    },
}

impl EvalError {
    pub(crate) fn syntax(expression: &str, position: usize, detail: impl Into<String>) -> Self {
        EvalError::Syntax {
            expression: expression.to_string(),
            position,
            detail: detail.into(),
        }
    }
}

/// Result type for expression evaluation.
pub type Result<T> = std::result::Result<T, EvalError>;
