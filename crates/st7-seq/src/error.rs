//! Error types for sequencer program interpretation.

use std::path::PathBuf;

use st7_model::Opcode;

/// Errors that can occur while assembling or interpreting labels.
#[derive(Debug, thiserror::Error)]
pub enum SeqError {
    /// Two ports of one burst claim the same pin.
    #[error("pin '{pin}' is claimed by ports '{first}' and '{second}'")]
    DuplicatePin {
        pin: String,
        first: String,
        second: String,
    },

    /// Label lookup found more than one file.
    #[error("label '{label}' found in {} files", candidates.len())]
    AmbiguousLabel {
        label: String,
        candidates: Vec<PathBuf>,
    },

    /// Label lookup found no file.
    #[error("label '{label}' not found")]
    MissingLabel { label: String },

    /// A burst calls something other than a MAIN label.
    #[error("label '{label}' is not a MAIN label")]
    NotMainLabel { label: String },

    /// An instruction or record belongs to another port than its program.
    #[error("port mismatch in label '{label}': expected '{expected}', found '{found}'")]
    PortMismatch {
        label: String,
        expected: String,
        found: String,
    },

    /// A port is not part of the pin topology.
    #[error("port '{port}' is not defined in the pin topology")]
    UnknownPort { port: String },

    /// The records of a vector file do not form a label.
    #[error("malformed label '{label}': {detail}")]
    MalformedLabel { label: String, detail: String },

    /// A program ran out of instructions before STOP or BEND.
    #[error("program of label '{label}' on port '{port}' has no terminating instruction")]
    MissingTerminal { label: String, port: String },

    /// An instruction that the program kind does not allow.
    #[error("unexpected {opcode} at command {cmd_no} of label '{label}' on port '{port}'")]
    UnexpectedInstruction {
        label: String,
        port: String,
        cmd_no: u32,
        opcode: Opcode,
    },

    /// A count operand that is not a non-negative integer.
    #[error("invalid operand '{operand}' for {opcode} at command {cmd_no} of label '{label}'")]
    InvalidOperand {
        label: String,
        cmd_no: u32,
        opcode: Opcode,
        operand: String,
    },

    /// A vector or cycle counter left the `u64` range.
    #[error("vector or cycle count of label '{label}' overflows")]
    CountOverflow { label: String },

    /// The label source failed to read a file.
    #[error("cannot load label '{label}'")]
    Source {
        label: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SeqError {
    /// Whether the caller may skip the offending label and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SeqError::AmbiguousLabel { .. } | SeqError::MissingLabel { .. } | SeqError::Source { .. }
        )
    }
}

/// Result type for sequencer interpretation.
pub type Result<T> = std::result::Result<T, SeqError>;
