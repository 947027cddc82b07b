//! Vector files, sequencer programs and pattern labels.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::container::{Container, Keyed};
use crate::error::ModelError;

macro_rules! opcodes {
    ($($variant:ident),* $(,)?) => {
        /// Sequencer instruction opcodes, named by their mnemonics.
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant),*
        }

        impl Opcode {
            /// Every opcode, in mnemonic order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant),*];

            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $(Opcode::$variant => stringify!($variant)),*
                }
            }
        }

        impl FromStr for Opcode {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, ModelError> {
                match s {
                    $(stringify!($variant) => Ok(Opcode::$variant),)*
                    other => Err(ModelError::Inconsistent {
                        detail: format!("unknown sequencer instruction '{other}'"),
                    }),
                }
            }
        }
    };
}

opcodes!(
    BEND, BRKV, CALL, CLEV, COGO, CTIM, FLQU, GENV, JMPE, JPPS, JSUB, JTIN, LBGN, LEND, LPBK,
    MACT, MBGN, MEAS, MEND, MJPE, MRPT, NOP, PRBS, RETC, RGOP, RPTJ, RPTV, RSJP, RSUB, SRCV,
    SSRC, STOP, STSA, STVA, TMUA, WAIT, WTER, XACT,
);

impl Opcode {
    /// Instructions that close a sequencer program.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Opcode::STOP | Opcode::BEND)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl Serialize for Opcode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.mnemonic())
    }
}

/// One `SQPG cmd,instr,p1,p2,mem,(port)` record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub cmd_no: u32,
    pub opcode: Opcode,
    pub operand1: String,
    pub operand2: String,
    pub memory: String,
    pub port: String,
}

impl Instruction {
    pub fn new(cmd_no: u32, opcode: Opcode, port: impl Into<String>) -> Self {
        Self {
            cmd_no,
            opcode,
            operand1: String::new(),
            operand2: String::new(),
            memory: String::new(),
            port: port.into(),
        }
    }

    pub fn with_operands(mut self, operand1: impl Into<String>, operand2: impl Into<String>) -> Self {
        self.operand1 = operand1.into();
        self.operand2 = operand2.into();
        self
    }

    /// The label named by a `CALL`, with surrounding quotes removed.
    pub fn call_target(&self) -> Option<&str> {
        match self.opcode {
            Opcode::CALL => Some(self.operand2.trim_matches('"')),
            _ => None,
        }
    }
}

/// Memory area named by a `DMAS` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DmaArea {
    Mtst,
    Para,
    Sqpg,
}

impl FromStr for DmaArea {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, ModelError> {
        match s {
            "MTST" => Ok(DmaArea::Mtst),
            "PARA" => Ok(DmaArea::Para),
            "SQPG" => Ok(DmaArea::Sqpg),
            other => Err(ModelError::Inconsistent {
                detail: format!("unknown DMAS area '{other}'"),
            }),
        }
    }
}

/// One `DMAS area,mem,size,(port)` record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dmas {
    pub area: DmaArea,
    pub memory: String,
    pub size: u64,
    pub port: String,
}

/// Label kind from a `SQLB` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LabelKind {
    Main,
    Mpbu,
}

impl FromStr for LabelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, ModelError> {
        match s {
            "MAIN" => Ok(LabelKind::Main),
            "MPBU" => Ok(LabelKind::Mpbu),
            other => Err(ModelError::Inconsistent {
                detail: format!("unsupported label type '{other}'"),
            }),
        }
    }
}

/// One `SQLB "label",type,start,stop,"wvtbl_or_sync"[,(port)]` record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelDef {
    pub name: String,
    pub kind: LabelKind,
    pub start: u32,
    pub stop: u32,
    /// Base wave table for MAIN labels, sync group for MPBU labels.
    pub wavetable_or_sync: String,
    pub port: String,
}

/// The raw records of one vector file, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFile {
    pub path: Option<PathBuf>,
    pub dmas: Vec<Dmas>,
    pub labels: Vec<LabelDef>,
    pub instructions: Vec<Instruction>,
}

/// An interpreted instruction stream with its accumulated cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SequencerProgram {
    pub label: String,
    pub port: String,
    /// Command number → instruction, in execution order.
    pub program: IndexMap<u32, Instruction>,
    pub vectors: u64,
    pub cycles: u64,
}

impl SequencerProgram {
    pub fn new(label: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.program.len()
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }

    pub fn first_cmd_no(&self) -> Option<u32> {
        self.program.keys().next().copied()
    }

    pub fn last_cmd_no(&self) -> Option<u32> {
        self.program.keys().last().copied()
    }
}

/// A single-port pattern label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainLabel {
    pub name: String,
    #[serde(skip)]
    pub path: Option<PathBuf>,
    pub port: String,
    pub start: u32,
    pub stop: u32,
    pub wavetable: String,
    pub program: SequencerProgram,
}

/// One port of a multi-port burst label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MpbPort {
    pub name: String,
    pub memory: String,
    pub seq_size: u64,
    pub sync_group: String,
    pub program: SequencerProgram,
}

impl Keyed for MpbPort {
    type Key = String;
    const KIND: &'static str = "port";
    fn key(&self) -> String {
        self.name.clone()
    }
}

/// A multi-port burst label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MpbLabel {
    pub name: String,
    #[serde(skip)]
    pub path: Option<PathBuf>,
    pub ports: Container<MpbPort>,
}

/// A pattern label of either kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Label {
    Main(MainLabel),
    Mpb(MpbLabel),
}

impl Label {
    pub fn name(&self) -> &str {
        match self {
            Label::Main(l) => &l.name,
            Label::Mpb(l) => &l.name,
        }
    }
}
