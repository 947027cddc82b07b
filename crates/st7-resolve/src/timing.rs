//! Resolution of timing sets into a period and per-pin edge times.

use std::borrow::Cow;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use st7_expr::{Evaluate, Variables};
use st7_model::{EdgeId, SpecSetId, Timing, TimingSet};
use tracing::debug;

use crate::closure::{apply_equations, seed_from_specset, value_of};
use crate::error::{inconsistent, Result};

/// The period and edge times of one timing set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PinEdges {
    pub period: f64,
    /// Pin → edge → time.
    pub pins: IndexMap<String, IndexMap<EdgeId, f64>>,
}

/// Outcome of resolving one `(eqnset, specset, timingset)` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingResolution {
    pub variables: Variables,
    pub pin_edges: PinEdges,
}

/// Rewrites `fract(num, den, scale)` periods into plain arithmetic.
#[derive(Debug, Clone)]
pub(crate) struct PeriodGrammar {
    fract: Regex,
}

impl PeriodGrammar {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            fract: Regex::new(
                r"^fract\(\s*(?P<num>[\w.]+)\s*,\s*(?P<den>[\w.]+)\s*,\s*(?P<scale>[\w.]+)\s*\)$",
            )?,
        })
    }

    /// `fract(n, d, s)` becomes `(n/d)*(s)`; anything else is left alone.
    pub(crate) fn rewrite<'a>(&self, period: &'a str) -> Result<Cow<'a, str>> {
        let period = period.trim();
        if !period.contains("fract(") {
            return Ok(Cow::Borrowed(period));
        }
        let caps = self
            .fract
            .captures(period)
            .ok_or_else(|| inconsistent(format!("malformed fract period '{period}'")))?;
        Ok(Cow::Owned(format!(
            "({}/{})*({})",
            &caps["num"], &caps["den"], &caps["scale"]
        )))
    }
}

pub(crate) fn resolve<E: Evaluate>(
    evaluator: &E,
    periods: &PeriodGrammar,
    timing: &Timing,
    eqnset: u32,
    specset: u32,
    timingset: u32,
) -> Result<TimingResolution> {
    let eqn = timing.eqnsets.require(&eqnset)?;
    let set = timing
        .specsets
        .require(&SpecSetId::new(eqnset, specset))?;
    let ts = eqn.setups.timingsets.require(&timingset)?;

    let mut variables = seed_from_specset(eqn, set)?;
    apply_equations(evaluator, eqn, &mut variables)?;
    let pin_edges = pin_edges(evaluator, periods, eqnset, ts, &variables)?;
    debug!(
        eqnset,
        specset,
        timingset,
        period = pin_edges.period,
        pins = pin_edges.pins.len(),
        "resolved timing"
    );
    Ok(TimingResolution {
        variables,
        pin_edges,
    })
}

/// Evaluate the period and every edge of a timing set against a closure.
pub(crate) fn pin_edges<E: Evaluate>(
    evaluator: &E,
    periods: &PeriodGrammar,
    eqnset: u32,
    timingset: &TimingSet,
    variables: &Variables,
) -> Result<PinEdges> {
    let period = timingset.period.as_deref().ok_or_else(|| {
        inconsistent(format!(
            "TIMINGSET {} of EQNSET {eqnset} has no period",
            timingset.num
        ))
    })?;
    let expression = periods.rewrite(period)?;
    let period = value_of(evaluator, &expression, variables, || {
        format!("period of TIMINGSET {} of EQNSET {eqnset}", timingset.num)
    })?;

    let mut pins: IndexMap<String, IndexMap<EdgeId, f64>> = IndexMap::new();
    for block in &timingset.edgeblocks {
        for (edge, expression) in &block.edges {
            let value = value_of(evaluator, expression, variables, || {
                format!("{edge} = {expression} for pins {}", block.pins.join(" "))
            })?;
            for pin in &block.pins {
                pins.entry(pin.clone()).or_default().insert(*edge, value);
            }
        }
    }
    Ok(PinEdges { period, pins })
}

#[cfg(test)]
mod tests {
    use st7_expr::Evaluator;
    use st7_model::{EdgeBlock, Spec, SpecSet, TimingEqnSet};

    use super::*;
    use crate::error::ResolveError;

    fn edge(s: &str) -> EdgeId {
        s.parse().unwrap()
    }

    fn timing() -> Timing {
        let mut eqn = TimingEqnSet::new(1, "tim");
        eqn.declare_spec("t_per", "ns");
        eqn.declare_spec("t_ofs", "ns");
        eqn.add_equation("half", "t_per / 2").unwrap();

        let mut cycle = TimingSet::new(1, "cycle");
        cycle.period = Some("t_per".into());
        let mut clk = EdgeBlock::new(["CLK", "DATA"]);
        clk.set(edge("d1"), "0").unwrap();
        clk.set(edge("d2"), "half + t_ofs").unwrap();
        cycle.edgeblocks.push(clk);
        let mut data = EdgeBlock::new(["DATA"]);
        data.set(edge("r1"), "0.75*t_per").unwrap();
        cycle.edgeblocks.push(data);
        eqn.setups.timingsets.add(cycle).unwrap();

        let mut fract = TimingSet::new(2, "fract");
        fract.period = Some("fract(1,4,100)".into());
        eqn.setups.timingsets.add(fract).unwrap();

        let mut scaled = TimingSet::new(3, "scaled");
        scaled.period = Some("fract(3, 4, t_per)".into());
        eqn.setups.timingsets.add(scaled).unwrap();

        eqn.setups.timingsets.add(TimingSet::new(4, "no period")).unwrap();

        let mut specs = SpecSet::new(1, 1, "typ");
        specs.specs.add(Spec::new("t_per", 12.0)).unwrap();
        specs.specs.add(Spec::new("t_ofs", 1.0)).unwrap();

        let mut t = Timing::new();
        t.eqnsets.add(eqn).unwrap();
        t.specsets.add(specs).unwrap();
        t
    }

    fn run(timingset: u32) -> Result<TimingResolution> {
        resolve(&Evaluator, &PeriodGrammar::new()?, &timing(), 1, 1, timingset)
    }

    #[test]
    fn period_copied_from_closure() {
        let r = run(1).unwrap();
        assert_eq!(r.pin_edges.period, 12.0);
        assert_eq!(r.variables["half"], 6.0);
    }

    #[test]
    fn edges_written_per_pin() {
        let r = run(1).unwrap();
        let clk = &r.pin_edges.pins["CLK"];
        assert_eq!(clk[&edge("d1")], 0.0);
        assert_eq!(clk[&edge("d2")], 7.0);
        assert_eq!(clk.len(), 2);
        let data = &r.pin_edges.pins["DATA"];
        assert_eq!(data[&edge("r1")], 9.0);
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn fract_period_rewritten() {
        assert_eq!(run(2).unwrap().pin_edges.period, 25.0);
        assert_eq!(run(3).unwrap().pin_edges.period, 9.0);
    }

    #[test]
    fn missing_period_is_an_inconsistency() {
        let err = run(4).unwrap_err();
        assert!(matches!(err, ResolveError::ParseInconsistency(_)));
        assert!(err.to_string().contains("TIMINGSET 4 of EQNSET 1 has no period"));
    }

    #[test]
    fn rewrite_forms() {
        let g = PeriodGrammar::new().unwrap();
        assert_eq!(g.rewrite(" t_per ").unwrap(), "t_per");
        assert_eq!(g.rewrite("fract(1,4,100)").unwrap(), "(1/4)*(100)");
        assert_eq!(g.rewrite("fract( 2 , 3 , t )").unwrap(), "(2/3)*(t)");
        assert!(g.rewrite("fract(1,4)").is_err());
        assert!(g.rewrite("2*fract(1,4,100)").is_err());
    }

    #[test]
    fn edge_keys_serialize_as_names() {
        let r = run(1).unwrap();
        let json = serde_json::to_value(&r.pin_edges).unwrap();
        assert_eq!(json["period"], serde_json::json!(12.0));
        assert_eq!(json["pins"]["DATA"]["r1"], serde_json::json!(9.0));
    }
}
