//! Resolution of multi-port specifications.
//!
//! Each port set gets its own closure. Its equation set declares which
//! specs it needs; a value given inside the port set wins, the
//! specification's top-level value is the fallback.

use indexmap::IndexMap;
use serde::Serialize;
use st7_expr::{Evaluate, Variables};
use st7_model::Timing;
use tracing::debug;

use crate::closure::apply_equations;
use crate::error::{inconsistent, ResolveError, Result};
use crate::timing::{pin_edges, PeriodGrammar, PinEdges};

/// One port of a resolved specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortResolution {
    pub eqnset: u32,
    pub timingset: u32,
    pub wavetable: String,
    pub variables: Variables,
    pub pin_edges: PinEdges,
}

/// A resolved specification: port → resolution, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiportResolution {
    pub specification: String,
    pub ports: IndexMap<String, PortResolution>,
}

pub(crate) fn resolve<E: Evaluate>(
    evaluator: &E,
    periods: &PeriodGrammar,
    timing: &Timing,
    specification: &str,
    timingsets: &[u32],
) -> Result<MultiportResolution> {
    let spec = timing.specifications.require(&specification.to_string())?;
    let count = spec.portsets.len();
    let timingsets = match timingsets {
        [one] => vec![*one; count],
        all if all.len() == count => all.to_vec(),
        all => {
            return Err(inconsistent(format!(
                "SPECIFICATION {specification} has {count} ports but {} timing sets were given",
                all.len()
            )))
        }
    };
    let globals: Variables = spec
        .specs
        .iter()
        .map(|s| (s.name.clone(), s.actual))
        .collect();

    let mut ports = IndexMap::with_capacity(count);
    for (portset, timingset) in spec.portsets.iter().zip(timingsets) {
        let eqn = timing.eqnsets.require(&portset.eqnset)?;

        let mut slots: IndexMap<&str, Option<f64>> =
            eqn.specs.keys().map(|name| (name.as_str(), None)).collect();
        for local in portset.specs.iter() {
            let slot = slots.get_mut(local.name.as_str()).ok_or_else(|| {
                inconsistent(format!(
                    "spec '{}' of port '{}' is not declared by EQNSET {}",
                    local.name, portset.port, eqn.num
                ))
            })?;
            *slot = Some(local.actual);
        }
        let mut variables = Variables::with_capacity(slots.len() + eqn.equations.len());
        for (name, local) in slots {
            let value = local
                .or_else(|| globals.get(name).copied())
                .ok_or_else(|| ResolveError::UnresolvedGlobalSpec {
                    spec: name.to_string(),
                    port: portset.port.clone(),
                    specification: specification.to_string(),
                })?;
            variables.insert(name.to_string(), value);
        }
        apply_equations(evaluator, eqn, &mut variables)?;

        let ts = eqn.setups.timingsets.require(&timingset)?;
        let pin_edges = pin_edges(evaluator, periods, eqn.num, ts, &variables)?;
        ports.insert(
            portset.port.clone(),
            PortResolution {
                eqnset: eqn.num,
                timingset,
                wavetable: portset.wavetable.clone(),
                variables,
                pin_edges,
            },
        );
    }
    debug!(specification, ports = ports.len(), "resolved specification");
    Ok(MultiportResolution {
        specification: specification.to_string(),
        ports,
    })
}
