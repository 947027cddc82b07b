//! Per-pin rows for label costs.

use indexmap::IndexMap;
use serde::Serialize;
use st7_model::{MainLabel, MpbLabel, PinTopology};

use crate::error::{Result, SeqError};
use crate::mpb::{interpret_mpb_label, PortCost};
use crate::program::Cost;

/// Cost seen by one pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinRow {
    pub port: String,
    pub vectors: u64,
    pub cycles: u64,
    pub num_of_labels: u64,
}

/// Map every pin of the given ports to its port.
///
/// Fails if a pin belongs to more than one of them.
pub fn pin_owners<'a, I>(topology: &PinTopology, ports: I) -> Result<IndexMap<String, String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut owners: IndexMap<String, String> = IndexMap::new();
    for port in ports {
        let pins = topology
            .port_pins(port)
            .ok_or_else(|| SeqError::UnknownPort {
                port: port.to_string(),
            })?;
        for pin in pins {
            if let Some(first) = owners.get(pin) {
                return Err(SeqError::DuplicatePin {
                    pin: pin.to_string(),
                    first: first.clone(),
                    second: port.to_string(),
                });
            }
            owners.insert(pin.to_string(), port.to_string());
        }
    }
    Ok(owners)
}

/// Rows for a MAIN label: every pin of its port ran the label once.
pub fn main_label_rows(label: &MainLabel, topology: &PinTopology) -> Result<IndexMap<String, PinRow>> {
    let owners = pin_owners(topology, [label.port.as_str()])?;
    let cost = Cost::from(&label.program);
    Ok(owners
        .into_iter()
        .map(|(pin, port)| {
            let row = PinRow {
                port,
                vectors: cost.vectors,
                cycles: cost.cycles,
                num_of_labels: 1,
            };
            (pin, row)
        })
        .collect())
}

/// Rows for a burst: pin ownership is checked before any label is costed.
pub fn mpb_label_rows<F>(
    label: &MpbLabel,
    topology: &PinTopology,
    label_cost: F,
) -> Result<IndexMap<String, PinRow>>
where
    F: FnMut(&str) -> Result<Cost>,
{
    let owners = pin_owners(topology, label.ports.keys().map(String::as_str))?;
    let ports = interpret_mpb_label(label, label_cost)?;
    Ok(pin_rows(owners, &ports))
}

/// Rows from pin owners and the port costs of an already costed burst.
pub fn pin_rows(
    owners: IndexMap<String, String>,
    ports: &IndexMap<String, PortCost>,
) -> IndexMap<String, PinRow> {
    owners
        .into_iter()
        .map(|(pin, port)| {
            let cost = ports.get(&port).copied().unwrap_or_default();
            let row = PinRow {
                port,
                vectors: cost.vectors,
                cycles: cost.cycles,
                num_of_labels: cost.num_of_labels,
            };
            (pin, row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use st7_model::{Container, Instruction, MpbPort, Opcode, SequencerProgram};

    use super::*;

    fn topology() -> PinTopology {
        let mut t = PinTopology::new(["P1", "P2", "P3"], ["VDD"]);
        t.add_port("pA", ["P1", "P2"]).unwrap();
        t.add_port("pB", ["P3"]).unwrap();
        t.add_port("pC", ["P1"]).unwrap();
        t
    }

    fn burst(ports: &[&str]) -> MpbLabel {
        let mut c = Container::new();
        for name in ports {
            let mut program = SequencerProgram::new("burst", *name);
            program.program.insert(
                0,
                Instruction::new(0, Opcode::CALL, *name).with_operands("", "\"main\""),
            );
            program
                .program
                .insert(1, Instruction::new(1, Opcode::BEND, *name));
            c.add(MpbPort {
                name: name.to_string(),
                memory: "SM".into(),
                seq_size: 2,
                sync_group: "grp".into(),
                program,
            })
            .unwrap();
        }
        MpbLabel {
            name: "burst".into(),
            path: None,
            ports: c,
        }
    }

    #[test]
    fn burst_rows_follow_port_pins() {
        let rows = mpb_label_rows(&burst(&["pA", "pB"]), &topology(), |_| {
            Ok(Cost {
                vectors: 8,
                cycles: 17,
            })
        })
        .unwrap();
        assert_eq!(rows.keys().collect::<Vec<_>>(), vec!["P1", "P2", "P3"]);
        assert_eq!(rows["P2"].port, "pA");
        assert_eq!(rows["P3"].cycles, 17);
        assert_eq!(rows["P3"].num_of_labels, 1);
    }

    #[test]
    fn duplicate_pin_detected_before_costing() {
        let calls = Cell::new(0);
        let err = mpb_label_rows(&burst(&["pA", "pC"]), &topology(), |_| {
            calls.set(calls.get() + 1);
            Ok(Cost::default())
        })
        .unwrap_err();
        match err {
            SeqError::DuplicatePin { pin, first, second } => {
                assert_eq!((pin.as_str(), first.as_str(), second.as_str()), ("P1", "pA", "pC"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn rows_from_port_costs() {
        let owners = pin_owners(&topology(), ["pA", "pB"]).unwrap();
        let ports = IndexMap::from([(
            "pA".to_string(),
            PortCost {
                vectors: 4,
                cycles: 6,
                num_of_labels: 2,
            },
        )]);
        let rows = pin_rows(owners, &ports);
        assert_eq!(rows["P1"].num_of_labels, 2);
        assert_eq!(rows["P3"].port, "pB");
        assert_eq!(rows["P3"].cycles, 0);
    }

    #[test]
    fn unknown_port_rejected() {
        let err = pin_owners(&topology(), ["pZ"]).unwrap_err();
        assert_eq!(err.to_string(), "port 'pZ' is not defined in the pin topology");
    }

    #[test]
    fn main_label_on_catch_all_port_covers_every_pin() {
        let mut program = SequencerProgram::new("m", "@");
        program.vectors = 3;
        program.cycles = 9;
        let label = MainLabel {
            name: "m".into(),
            path: None,
            port: "@".into(),
            start: 0,
            stop: 0,
            wavetable: "wt".into(),
            program,
        };
        let rows = main_label_rows(&label, &topology()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.values().all(|r| r.vectors == 3 && r.cycles == 9 && r.num_of_labels == 1));
    }
}
