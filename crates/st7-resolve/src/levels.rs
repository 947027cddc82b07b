//! Resolution of levels setups into per-supply and per-pin settings.

use indexmap::IndexMap;
use serde::Serialize;
use st7_expr::{EvalError, Evaluate, Variables};
use st7_model::{Levels, Setting, SettingBlock, SpecSetId};
use tracing::{debug, warn};

use crate::closure::{apply_equations, seed_from_specset, value_of};
use crate::error::{ResolveError, Result};

/// The concrete value of one setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Number(f64),
    Literal(String),
    Flag(bool),
}

impl SettingValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SettingValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// Setting name → value, in declaration order.
pub type SettingValues = IndexMap<String, SettingValue>;

/// Resolved settings keyed by supply and by pin.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PinSettings {
    pub dps: IndexMap<String, SettingValues>,
    pub pins: IndexMap<String, SettingValues>,
}

/// Outcome of resolving one `(eqnset, specset, levelset)` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelsResolution {
    pub variables: Variables,
    pub pin_settings: PinSettings,
}

pub(crate) fn resolve<E: Evaluate>(
    evaluator: &E,
    levels: &Levels,
    eqnset: u32,
    specset: u32,
    levelset: u32,
) -> Result<LevelsResolution> {
    let eqn = levels.eqnsets.require(&eqnset)?;
    let set = levels
        .specsets
        .require(&SpecSetId::new(eqnset, specset))?;
    let level = eqn.setups.levelsets.require(&levelset)?;

    let mut variables = seed_from_specset(eqn, set)?;
    apply_equations(evaluator, eqn, &mut variables)?;

    let mut pin_settings = PinSettings::default();
    for block in &eqn.setups.dpsblocks {
        settle(evaluator, block, &variables, &mut pin_settings.dps)?;
    }
    for block in &level.pinblocks {
        settle(evaluator, block, &variables, &mut pin_settings.pins)?;
    }
    debug!(
        eqnset,
        specset,
        levelset,
        supplies = pin_settings.dps.len(),
        pins = pin_settings.pins.len(),
        "resolved levels"
    );
    Ok(LevelsResolution {
        variables,
        pin_settings,
    })
}

/// Evaluate every setting of a block once and write it to each of its pins.
///
/// A pin named by several blocks collects the settings of all of them.
fn settle<E: Evaluate>(
    evaluator: &E,
    block: &SettingBlock,
    variables: &Variables,
    target: &mut IndexMap<String, SettingValues>,
) -> Result<()> {
    for (name, setting) in &block.settings {
        let value = match setting {
            Setting::Literal(text) => SettingValue::Literal(text.clone()),
            Setting::Flag(flag) => SettingValue::Flag(*flag),
            Setting::Expr(expression) => {
                SettingValue::Number(expression_value(evaluator, block, name, expression, variables)?)
            }
        };
        for pin in &block.pins {
            target
                .entry(pin.clone())
                .or_default()
                .insert(name.clone(), value.clone());
        }
    }
    Ok(())
}

fn expression_value<E: Evaluate>(
    evaluator: &E,
    block: &SettingBlock,
    name: &str,
    expression: &str,
    variables: &Variables,
) -> Result<f64> {
    let context = || format!("{name} = {expression} for pins {}", block.pins.join(" "));
    match value_of(evaluator, expression, variables, context) {
        Ok(value) => Ok(value),
        // Conditionals may select a branch naming a variable this setup
        // never defines.
        Err(
            err @ ResolveError::Eval {
                source: EvalError::UnresolvedIdentifier { .. },
                ..
            },
        ) if expression.contains('?') => {
            warn!(
                setting = name,
                pins = %block.pins.join(" "),
                error = %err,
                "conditional setting did not evaluate, using 0.0"
            );
            Ok(0.0)
        }
        Err(err) => Err(err),
    }
}
