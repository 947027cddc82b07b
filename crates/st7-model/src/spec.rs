//! Spec values and spec sets.

use std::fmt;

use serde::Serialize;

use crate::container::{Container, Keyed};

/// One concrete spec value: `name act [min] [max] [unit] # comment`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spec {
    pub name: String,
    /// The value used for resolution.
    pub actual: f64,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub unit: String,
    pub comment: String,
}

impl Spec {
    /// A spec with only a name and an actual value.
    pub fn new(name: impl Into<String>, actual: f64) -> Self {
        Self {
            name: name.into(),
            actual,
            minimum: None,
            maximum: None,
            unit: String::new(),
            comment: String::new(),
        }
    }
}

impl Keyed for Spec {
    type Key = String;
    const KIND: &'static str = "SPEC";
    fn key(&self) -> String {
        self.name.clone()
    }
}

/// Spec set numbers run from 0 to this value within one equation set.
pub const MAX_SPECSET_NUM: u32 = 99;

/// Key of a spec set: its equation set and its number within it.
///
/// Displayed in the tester's `eqnset * 100 + num` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpecSetId {
    pub eqnset: u32,
    pub num: u32,
}

impl SpecSetId {
    pub fn new(eqnset: u32, num: u32) -> Self {
        Self { eqnset, num }
    }
}

impl fmt::Display for SpecSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.num > MAX_SPECSET_NUM {
            return write!(f, "{}:{}", self.eqnset, self.num);
        }
        write!(f, "{}", u64::from(self.eqnset) * 100 + u64::from(self.num))
    }
}

/// Concrete values instantiating the declared specs of one EqnSet.
///
/// Keyed by [`SpecSetId`], so two equation sets may each have a spec set
/// number 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecSet {
    pub eqnset: u32,
    pub num: u32,
    pub description: String,
    /// Wave table bound in a single-port timing spec set.
    pub wavetable: Option<String>,
    /// `CHECK` mode of a single-port timing spec set.
    pub check: Option<String>,
    pub specs: Container<Spec>,
}

impl SpecSet {
    pub fn new(eqnset: u32, num: u32, description: impl Into<String>) -> Self {
        Self {
            eqnset,
            num,
            description: description.into(),
            wavetable: None,
            check: None,
            specs: Container::new(),
        }
    }

    /// The container key.
    pub fn id(&self) -> SpecSetId {
        SpecSetId::new(self.eqnset, self.num)
    }
}

impl Keyed for SpecSet {
    type Key = SpecSetId;
    const KIND: &'static str = "SPECSET";
    fn key(&self) -> SpecSetId {
        self.id()
    }
}
