//! Data model for the levels, timing and vector setups of a test program.
//!
//! Entities are grouped by the file kind they come from:
//! - **Levels:** EqnSet → LevelSet → PinBlock, EqnSet → DpsBlock, SpecSet → Spec
//! - **Timing:** EqnSet → TimingSet → EdgeBlock, Specification → PortSet → Spec,
//!   WaveTable → WaveformBlock → Waveform
//! - **Vectors:** MAIN and multi-port-burst labels owning sequencer programs
//!
//! Every container owns its children, keys are unique within a container and
//! insertion order is preserved. The model is built once by the parsers and is
//! read-only for the resolver and the sequencer interpreter.

pub mod container;
pub mod eqnset;
pub mod error;
pub mod levels;
pub mod spec;
pub mod timing;
pub mod topology;
pub mod vectors;

pub use container::{Container, Keyed};
pub use eqnset::EqnSet;
pub use error::{ModelError, Result};
pub use levels::{LevelSet, LevelSetups, Levels, LevelsEqnSet, Setting, SettingBlock};
pub use spec::{Spec, SpecSet, SpecSetId, MAX_SPECSET_NUM};
pub use timing::{
    EdgeBlock, EdgeId, EdgeKind, PortSet, Specification, Timing, TimingEqnSet, TimingSet,
    TimingSetups, WaveEdge, WaveTable, Waveform, WaveformBlock,
};
pub use topology::{PinTopology, CATCH_ALL_PORT};
pub use vectors::{
    DmaArea, Dmas, Instruction, Label, LabelDef, LabelKind, MainLabel, MpbLabel, MpbPort, Opcode,
    SequencerProgram, VectorFile,
};
