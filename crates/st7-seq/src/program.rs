//! Cost accounting for sequencer instruction streams.
//!
//! - `GENV n`: n vectors, n cycles
//! - `RPTV n,r`: n vectors, n×r cycles
//! - `STOP`, `BEND`: end of program
//!
//! Every other instruction is recorded but costs nothing.

use std::ops::RangeInclusive;

use serde::Serialize;
use st7_model::{Instruction, Opcode, SequencerProgram};

use crate::error::{Result, SeqError};

/// Vectors and cycles emitted by a program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cost {
    pub vectors: u64,
    pub cycles: u64,
}

impl Cost {
    /// Sum of two costs; `None` if either counter overflows.
    pub fn checked_add(self, other: Cost) -> Option<Cost> {
        Some(Cost {
            vectors: self.vectors.checked_add(other.vectors)?,
            cycles: self.cycles.checked_add(other.cycles)?,
        })
    }
}

pub(crate) fn overflow(label: &str) -> SeqError {
    SeqError::CountOverflow {
        label: label.to_string(),
    }
}

impl From<&SequencerProgram> for Cost {
    fn from(program: &SequencerProgram) -> Self {
        Cost {
            vectors: program.vectors,
            cycles: program.cycles,
        }
    }
}

/// Cost of a single instruction.
pub fn instruction_cost(label: &str, instruction: &Instruction) -> Result<Cost> {
    let count = |operand: &str| -> Result<u64> {
        operand
            .trim()
            .parse()
            .map_err(|_| SeqError::InvalidOperand {
                label: label.to_string(),
                cmd_no: instruction.cmd_no,
                opcode: instruction.opcode,
                operand: operand.to_string(),
            })
    };
    Ok(match instruction.opcode {
        Opcode::GENV => {
            let n = count(&instruction.operand1)?;
            Cost {
                vectors: n,
                cycles: n,
            }
        }
        Opcode::RPTV => {
            let n = count(&instruction.operand1)?;
            let repeat = count(&instruction.operand2)?;
            Cost {
                vectors: n,
                cycles: n.checked_mul(repeat).ok_or_else(|| overflow(label))?,
            }
        }
        _ => Cost::default(),
    })
}

/// Sum the cost of a MAIN instruction stream up to its `STOP`.
pub fn interpret_main_label<'a, I>(label: &str, instructions: I) -> Result<Cost>
where
    I: IntoIterator<Item = &'a Instruction>,
{
    let mut cost = Cost::default();
    for instruction in instructions {
        if instruction.opcode == Opcode::STOP {
            break;
        }
        cost = cost
            .checked_add(instruction_cost(label, instruction)?)
            .ok_or_else(|| overflow(label))?;
    }
    Ok(cost)
}

/// Build the program of `label` on `port` from the instructions whose
/// command numbers fall in `range`.
///
/// Interpretation halts at the first `STOP` or `BEND`, which is kept as the
/// last instruction of the program.
pub fn build<'a, I>(
    label: &str,
    port: &str,
    instructions: I,
    range: RangeInclusive<u32>,
) -> Result<SequencerProgram>
where
    I: IntoIterator<Item = &'a Instruction>,
{
    let mut program = SequencerProgram::new(label, port);
    for instruction in instructions {
        if !range.contains(&instruction.cmd_no) {
            continue;
        }
        if instruction.port != port {
            return Err(SeqError::PortMismatch {
                label: label.to_string(),
                expected: port.to_string(),
                found: instruction.port.clone(),
            });
        }
        let total = Cost::from(&program)
            .checked_add(instruction_cost(label, instruction)?)
            .ok_or_else(|| overflow(label))?;
        program.vectors = total.vectors;
        program.cycles = total.cycles;
        program
            .program
            .insert(instruction.cmd_no, instruction.clone());
        if instruction.opcode.is_terminal() {
            return Ok(program);
        }
    }
    Err(SeqError::MissingTerminal {
        label: label.to_string(),
        port: port.to_string(),
    })
}
