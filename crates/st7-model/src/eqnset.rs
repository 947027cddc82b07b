//! Equation sets shared by levels and timing.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::container::Keyed;
use crate::error::{ModelError, Result};

/// A numbered bundle of declared specs and equations.
///
/// `S` holds what hangs off the equation set in each language: level sets and
/// DPS blocks for levels, timing sets and ports for timing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EqnSet<S> {
    pub num: u32,
    pub description: String,
    /// Declared spec names with their units, in declaration order.
    pub specs: IndexMap<String, String>,
    /// Equation name → expression text, in declaration order.
    pub equations: IndexMap<String, String>,
    pub setups: S,
    /// File the equation set was read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl<S: Default> EqnSet<S> {
    pub fn new(num: u32, description: impl Into<String>) -> Self {
        Self {
            num,
            description: description.into(),
            specs: IndexMap::new(),
            equations: IndexMap::new(),
            setups: S::default(),
            source: None,
        }
    }
}

impl<S> EqnSet<S> {
    /// Declare a spec; redeclaration keeps the first position and updates the unit.
    pub fn declare_spec(&mut self, name: impl Into<String>, unit: impl Into<String>) {
        self.specs.insert(name.into(), unit.into());
    }

    /// Add an equation; an equation may be defined only once.
    pub fn add_equation(&mut self, name: impl Into<String>, expr: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.equations.contains_key(&name) {
            return Err(ModelError::Duplicate {
                kind: "EQUATION",
                key: name,
            });
        }
        self.equations.insert(name, expr.into());
        Ok(())
    }

    pub fn declares(&self, spec: &str) -> bool {
        self.specs.contains_key(spec)
    }
}

impl<S> Keyed for EqnSet<S> {
    type Key = u32;
    const KIND: &'static str = "EQNSET";
    fn key(&self) -> u32 {
        self.num
    }
}
