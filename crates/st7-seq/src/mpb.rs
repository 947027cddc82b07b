//! Cost of multi-port burst labels.
//!
//! Every port of a burst calls MAIN labels in turn. A port costs the sum of
//! the labels it calls.

use indexmap::IndexMap;
use serde::Serialize;
use st7_model::{MpbLabel, Opcode};
use tracing::debug;

use crate::error::Result;
use crate::program::{overflow, Cost};

/// Accumulated cost of one burst port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PortCost {
    pub vectors: u64,
    pub cycles: u64,
    pub num_of_labels: u64,
}

impl PortCost {
    /// Count one called label; `burst` names the label in overflow errors.
    pub fn add_label(&mut self, burst: &str, cost: Cost) -> Result<()> {
        let sum = |a: u64, b: u64| a.checked_add(b).ok_or_else(|| overflow(burst));
        self.vectors = sum(self.vectors, cost.vectors)?;
        self.cycles = sum(self.cycles, cost.cycles)?;
        self.num_of_labels = sum(self.num_of_labels, 1)?;
        Ok(())
    }
}

/// Sum the cost of every port of a burst.
///
/// `label_cost` yields the cost of a called MAIN label; its errors (an
/// ambiguous or missing label) abort the burst.
pub fn interpret_mpb_label<F>(label: &MpbLabel, mut label_cost: F) -> Result<IndexMap<String, PortCost>>
where
    F: FnMut(&str) -> Result<Cost>,
{
    let mut ports = IndexMap::with_capacity(label.ports.len());
    for port in label.ports.iter() {
        let mut total = PortCost::default();
        for instruction in port.program.program.values() {
            if instruction.opcode == Opcode::BEND {
                break;
            }
            if let Some(target) = instruction.call_target() {
                total.add_label(&label.name, label_cost(target)?)?;
            }
        }
        debug!(
            label = %label.name,
            port = %port.name,
            vectors = total.vectors,
            cycles = total.cycles,
            labels = total.num_of_labels,
            "burst port cost"
        );
        ports.insert(port.name.clone(), total);
    }
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use st7_model::{Container, Instruction, MpbPort, SequencerProgram};

    use super::*;
    use crate::error::SeqError;

    fn port(name: &str, calls: &[&str]) -> MpbPort {
        let mut program = SequencerProgram::new("burst", name);
        for (i, call) in calls.iter().enumerate() {
            let instruction = Instruction::new(i as u32, Opcode::CALL, name)
                .with_operands("", format!("\"{call}\""));
            program.program.insert(i as u32, instruction);
        }
        let bend = calls.len() as u32;
        program
            .program
            .insert(bend, Instruction::new(bend, Opcode::BEND, name));
        MpbPort {
            name: name.to_string(),
            memory: "SM".into(),
            seq_size: u64::from(bend) + 1,
            sync_group: "grp".into(),
            program,
        }
    }

    fn burst(ports: Vec<MpbPort>) -> MpbLabel {
        let mut c = Container::new();
        for p in ports {
            c.add(p).unwrap();
        }
        MpbLabel {
            name: "burst".into(),
            path: None,
            ports: c,
        }
    }

    fn costs() -> HashMap<&'static str, Cost> {
        HashMap::from([
            ("a", Cost { vectors: 8, cycles: 17 }),
            ("b", Cost { vectors: 2, cycles: 4 }),
        ])
    }

    #[test]
    fn sums_called_labels_per_port() {
        let costs = costs();
        let label = burst(vec![port("pA", &["a", "b", "a"]), port("pB", &["b"])]);
        let ports = interpret_mpb_label(&label, |name| Ok(costs[name])).unwrap();
        assert_eq!(
            ports["pA"],
            PortCost {
                vectors: 18,
                cycles: 38,
                num_of_labels: 3
            }
        );
        assert_eq!(ports["pB"].num_of_labels, 1);
        assert_eq!(ports.keys().collect::<Vec<_>>(), vec!["pA", "pB"]);
    }

    #[test]
    fn port_without_calls_costs_nothing() {
        let label = burst(vec![port("pA", &[])]);
        let ports = interpret_mpb_label(&label, |_| unreachable!()).unwrap();
        assert_eq!(ports["pA"], PortCost::default());
    }

    #[test]
    fn port_total_overflow_is_an_error() {
        let label = burst(vec![port("pA", &["a", "huge"])]);
        let err = interpret_mpb_label(&label, |name| {
            Ok(match name {
                "huge" => Cost {
                    vectors: 1,
                    cycles: u64::MAX,
                },
                _ => costs()[name],
            })
        })
        .unwrap_err();
        assert!(matches!(err, SeqError::CountOverflow { ref label } if label == "burst"));
    }

    #[test]
    fn lookup_failure_aborts() {
        let label = burst(vec![port("pA", &["a", "zz"])]);
        let costs = costs();
        let err = interpret_mpb_label(&label, |name| {
            costs.get(name).copied().ok_or_else(|| SeqError::MissingLabel {
                label: name.to_string(),
            })
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "label 'zz' not found");
    }
}
