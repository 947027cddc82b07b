//! Explicit parser state threaded through every line.

use std::fmt;

use st7_model::ModelError;

use crate::error::ParseError;

/// A position in an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub origin: String,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.line)
    }
}

/// Where a parser is and what it has seen.
///
/// `S` is the file-specific state (current section, current equation set,
/// current block, ...). It is owned by the context and passed along with
/// every line, so a parser never relies on anything outside it.
#[derive(Debug)]
pub struct ParserContext<S> {
    origin: String,
    line_no: usize,
    pub state: S,
}

impl<S: Default> ParserContext<S> {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            line_no: 0,
            state: S::default(),
        }
    }
}

impl<S> ParserContext<S> {
    /// Record the 1-based number of the line about to be processed.
    pub fn at_line(&mut self, line_no: usize) {
        self.line_no = line_no;
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn location(&self) -> Location {
        Location {
            origin: self.origin.clone(),
            line: self.line_no,
        }
    }

    pub fn syntax(&self, line: &str, detail: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            location: self.location(),
            line: line.to_string(),
            detail: detail.into(),
        }
    }

    pub fn unsupported(&self, line: &str, construct: impl Into<String>) -> ParseError {
        ParseError::Unsupported {
            location: self.location(),
            line: line.to_string(),
            construct: construct.into(),
        }
    }

    /// Attach the current location to a model error.
    pub fn model(&self, source: ModelError) -> ParseError {
        ParseError::Model {
            location: self.location(),
            source,
        }
    }

    /// Lift a model result into a parse result at the current location.
    pub fn check<T>(&self, result: st7_model::Result<T>) -> crate::Result<T> {
        result.map_err(|e| self.model(e))
    }
}

/// Trimmed, non-blank, non-comment lines with their 1-based numbers.
pub fn significant_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}
