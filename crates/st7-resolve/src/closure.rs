//! Variable closures: specs first, then equations in declaration order.

use st7_expr::{Evaluate, Variables};
use st7_model::{EqnSet, SpecSet};

use crate::error::{ResolveError, Result};

/// Seed a closure with every spec the equation set declares, valued from
/// the spec set's actuals.
pub(crate) fn seed_from_specset<S>(eqnset: &EqnSet<S>, specset: &SpecSet) -> Result<Variables> {
    let mut variables = Variables::with_capacity(eqnset.specs.len() + eqnset.equations.len());
    for name in eqnset.specs.keys() {
        let spec = specset
            .specs
            .get(name)
            .ok_or_else(|| ResolveError::MissingSpec {
                spec: name.clone(),
                eqnset: eqnset.num,
                specset: specset.num,
            })?;
        variables.insert(name.clone(), spec.actual);
    }
    Ok(variables)
}

/// Evaluate the equations of `eqnset` into `variables`, in order.
pub(crate) fn apply_equations<S, E: Evaluate>(
    evaluator: &E,
    eqnset: &EqnSet<S>,
    variables: &mut Variables,
) -> Result<()> {
    for (name, expression) in &eqnset.equations {
        let value = value_of(evaluator, expression, variables, || {
            format!("equation '{name}' of EQNSET {}", eqnset.num)
        })?;
        variables.insert(name.clone(), value);
    }
    Ok(())
}

/// The value of one expression against a closure.
///
/// An expression naming a variable is copied without reaching the
/// evaluator.
pub(crate) fn value_of<E: Evaluate>(
    evaluator: &E,
    expression: &str,
    variables: &Variables,
    context: impl FnOnce() -> String,
) -> Result<f64> {
    if let Some(value) = variables.get(expression.trim()) {
        return Ok(*value);
    }
    evaluator
        .compute(expression, variables)
        .map_err(|source| ResolveError::Eval {
            context: context(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use st7_expr::{EvalError, Evaluator};
    use st7_model::Spec;

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct NoSetups;

    struct Counting {
        calls: Cell<usize>,
    }

    impl Evaluate for Counting {
        fn compute(&self, expression: &str, variables: &Variables) -> st7_expr::Result<f64> {
            self.calls.set(self.calls.get() + 1);
            Evaluator.compute(expression, variables)
        }
    }

    fn eqnset() -> EqnSet<NoSetups> {
        let mut e = EqnSet::new(1, "");
        e.declare_spec("A", "");
        e.add_equation("B", "A*2").unwrap();
        e.add_equation("C", "B+1").unwrap();
        e
    }

    fn specset(pairs: &[(&str, f64)]) -> SpecSet {
        let mut s = SpecSet::new(1, 1, "");
        for (name, value) in pairs {
            s.specs.add(Spec::new(*name, *value)).unwrap();
        }
        s
    }

    #[test]
    fn equations_see_earlier_equations() {
        let e = eqnset();
        let mut vars = seed_from_specset(&e, &specset(&[("A", 2.0)])).unwrap();
        apply_equations(&Evaluator, &e, &mut vars).unwrap();
        let expected: Variables = [("A", 2.0), ("B", 4.0), ("C", 5.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(vars, expected);
        assert_eq!(vars.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn undeclared_specset_values_are_ignored() {
        let e = eqnset();
        let vars = seed_from_specset(&e, &specset(&[("Z", 9.0), ("A", 1.0)])).unwrap();
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn missing_spec_reported() {
        let err = seed_from_specset(&eqnset(), &specset(&[])).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MissingSpec { ref spec, eqnset: 1, specset: 1 } if spec == "A"
        ));
    }

    #[test]
    fn bare_name_is_copied_without_evaluating() {
        let mut e: EqnSet<NoSetups> = EqnSet::new(1, "");
        e.declare_spec("t_per", "ns");
        e.add_equation("copy", "t_per").unwrap();
        e.add_equation("twice", "t_per*2").unwrap();
        let counting = Counting { calls: Cell::new(0) };
        let mut vars = seed_from_specset(&e, &specset(&[("t_per", 10.0)])).unwrap();
        apply_equations(&counting, &e, &mut vars).unwrap();
        assert_eq!(vars["copy"], 10.0);
        assert_eq!(vars["twice"], 20.0);
        assert_eq!(counting.calls.get(), 1);
    }

    #[test]
    fn failing_equation_names_itself() {
        let mut e: EqnSet<NoSetups> = EqnSet::new(7, "");
        e.add_equation("x", "nope + 1").unwrap();
        let mut vars = Variables::new();
        let err = apply_equations(&Evaluator, &e, &mut vars).unwrap_err();
        match err {
            ResolveError::Eval { context, source } => {
                assert_eq!(context, "equation 'x' of EQNSET 7");
                assert!(matches!(source, EvalError::UnresolvedIdentifier { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
