//! Timing setups: equation sets with timing sets, multi-port specifications
//! and wave tables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::container::{Container, Keyed};
use crate::eqnset::EqnSet;
use crate::error::{ModelError, Result};
use crate::spec::{Spec, SpecSet};

/// Drive or receive side of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Drive,
    Receive,
}

/// Edge identifier `d1`..`d8` or `r1`..`r8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId {
    kind: EdgeKind,
    index: u8,
}

impl EdgeId {
    pub const MAX_INDEX: u8 = 8;

    pub fn new(kind: EdgeKind, index: u8) -> Result<Self> {
        if !(1..=Self::MAX_INDEX).contains(&index) {
            return Err(ModelError::Inconsistent {
                detail: format!("edge index {index} outside 1..={}", Self::MAX_INDEX),
            });
        }
        Ok(Self { kind, index })
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn index(&self) -> u8 {
        self.index
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            EdgeKind::Drive => 'd',
            EdgeKind::Receive => 'r',
        };
        write!(f, "{prefix}{}", self.index)
    }
}

impl FromStr for EdgeId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ModelError::Inconsistent {
            detail: format!("invalid edge '{s}'"),
        };
        let mut chars = s.chars();
        let kind = match chars.next() {
            Some('d') => EdgeKind::Drive,
            Some('r') => EdgeKind::Receive,
            _ => return Err(invalid()),
        };
        let index: u8 = chars.as_str().parse().map_err(|_| invalid())?;
        EdgeId::new(kind, index)
    }
}

impl Serialize for EdgeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Pins sharing a set of edge expressions within a timing set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeBlock {
    pub pins: Vec<String>,
    pub edges: IndexMap<EdgeId, String>,
}

impl EdgeBlock {
    pub fn new<I, P>(pins: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            pins: pins.into_iter().map(Into::into).collect(),
            edges: IndexMap::new(),
        }
    }

    /// Define an edge expression; each edge may be defined once per block.
    pub fn set(&mut self, edge: EdgeId, expr: impl Into<String>) -> Result<()> {
        if self.edges.contains_key(&edge) {
            return Err(ModelError::Duplicate {
                kind: "edge",
                key: format!("{edge} for pins {}", self.pins.join(" ")),
            });
        }
        self.edges.insert(edge, expr.into());
        Ok(())
    }
}

/// A numbered timing template: a period and per-pin edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingSet {
    pub num: u32,
    pub description: String,
    pub period: Option<String>,
    pub edgeblocks: Vec<EdgeBlock>,
}

impl TimingSet {
    pub fn new(num: u32, description: impl Into<String>) -> Self {
        Self {
            num,
            description: description.into(),
            period: None,
            edgeblocks: Vec::new(),
        }
    }
}

impl Keyed for TimingSet {
    type Key = u32;
    const KIND: &'static str = "TIMINGSET";
    fn key(&self) -> u32 {
        self.num
    }
}

/// What a timing equation set owns besides specs and equations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingSetups {
    /// Ports named by `DEFINES`.
    pub ports: Vec<String>,
    pub timingsets: Container<TimingSet>,
}

pub type TimingEqnSet = EqnSet<TimingSetups>;

/// One port's binding inside a multi-port specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortSet {
    pub port: String,
    pub eqnset: u32,
    pub wavetable: String,
    pub sequence: Option<String>,
    pub clock: Option<String>,
    pub phase: bool,
    pub check: Option<String>,
    /// Port-local spec values; these take precedence over the global ones.
    pub specs: Container<Spec>,
}

impl PortSet {
    pub fn new(eqnset: u32) -> Self {
        Self {
            eqnset,
            ..Self::default()
        }
    }
}

impl Keyed for PortSet {
    type Key = String;
    const KIND: &'static str = "PORT";
    fn key(&self) -> String {
        self.port.clone()
    }
}

/// A named multi-port timing specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Specification {
    pub name: String,
    pub check: String,
    /// Global spec values, the fallback for every port.
    pub specs: Container<Spec>,
    pub portsets: Container<PortSet>,
}

impl Specification {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            check: "all".to_string(),
            specs: Container::new(),
            portsets: Container::new(),
        }
    }
}

impl Keyed for Specification {
    type Key = String;
    const KIND: &'static str = "SPECIFICATION";
    fn key(&self) -> String {
        self.name.clone()
    }
}

/// One `edge:action` pair of a physical waveform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveEdge {
    pub edge: EdgeId,
    pub action: String,
}

/// A physical waveform, keyed by its hexadecimal index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waveform {
    pub index: String,
    pub edges: Vec<WaveEdge>,
    pub device_cycle: String,
}

impl Keyed for Waveform {
    type Key = String;
    const KIND: &'static str = "waveform";
    fn key(&self) -> String {
        self.index.clone()
    }
}

/// Waveforms shared by a group of pins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaveformBlock {
    pub pins: Vec<String>,
    pub waveforms: Container<Waveform>,
    pub brk: Vec<WaveEdge>,
    /// Raw `STATEMAP` lines.
    pub statemap: Vec<String>,
}

impl WaveformBlock {
    pub fn new<I, P>(pins: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            pins: pins.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// A named wave table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaveTable {
    pub name: String,
    pub ports: Vec<String>,
    pub hrpf: bool,
    pub blocks: Vec<WaveformBlock>,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl WaveTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// All pins covered by this wave table, in block order.
    pub fn pins(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .flat_map(|b| b.pins.iter().map(String::as_str))
    }
}

impl Keyed for WaveTable {
    type Key = String;
    const KIND: &'static str = "WAVETBL";
    fn key(&self) -> String {
        self.name.clone()
    }
}

/// Everything read from one or more timing files.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timing {
    pub eqnsets: Container<TimingEqnSet>,
    pub specsets: Container<SpecSet>,
    pub specifications: Container<Specification>,
    pub wavetables: Container<WaveTable>,
}

impl Timing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another timing model into this one; keys must not collide.
    pub fn merge(&mut self, other: Timing) -> Result<()> {
        for e in other.eqnsets.iter() {
            self.eqnsets.add(e.clone())?;
        }
        for s in other.specsets.iter() {
            self.specsets.add(s.clone())?;
        }
        for s in other.specifications.iter() {
            self.specifications.add(s.clone())?;
        }
        for w in other.wavetables.iter() {
            self.wavetables.add(w.clone())?;
        }
        Ok(())
    }
}

/// Whether two waveform actions mean the same thing.
///
/// Wave tables may spell an action either in firmware form (`F00`, `E1`) or in
/// state-character form (`0`, `H`).
pub fn actions_equivalent(kind: EdgeKind, a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let pairs: &[(&str, &str)] = match kind {
        EdgeKind::Drive => &[
            ("0", "F00"),
            ("1", "F10"),
            ("Z", "FNZ"),
            ("!Z", "FN0"),
            (".", "N"),
        ],
        EdgeKind::Receive => &[
            ("L", "E0"),
            ("H", "E1"),
            ("M", "EI"),
            ("U", "EU"),
            ("X", "EX"),
            (".", "N"),
        ],
    };
    pairs
        .iter()
        .any(|&(x, y)| (a == x && b == y) || (a == y && b == x))
}
