//! `st7 levels`: resolve one levels setup.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use st7_expr::Variables;
use st7_resolve::{LevelsResolution, Resolver, SettingValue, SettingValues};

use crate::commands::{number, Format};

/// Which levels setup to resolve.
#[derive(Debug, Clone, Copy)]
pub struct LevelsQuery {
    pub eqnset: u32,
    pub specset: u32,
    pub levelset: u32,
}

/// Resolve and print a levels setup.
pub fn run(file: &Path, query: LevelsQuery, format: Format) -> Result<()> {
    print!("{}", render(file, query, format)?);
    Ok(())
}

pub(crate) fn render(file: &Path, query: LevelsQuery, format: Format) -> Result<String> {
    let levels = st7_parse::load_levels(file)
        .with_context(|| format!("loading levels from {}", file.display()))?;
    let resolution = Resolver::new()?
        .resolve_levels(&levels, query.eqnset, query.specset, query.levelset)
        .with_context(|| {
            format!(
                "resolving EQNSET {} SPECSET {} LEVELSET {}",
                query.eqnset, query.specset, query.levelset
            )
        })?;
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(&resolution)? + "\n"),
        Format::Human => Ok(human(query, &resolution)),
    }
}

fn human(query: LevelsQuery, r: &LevelsResolution) -> String {
    let mut out = format!(
        "Levels: EQNSET {}, SPECSET {}, LEVELSET {}\n",
        query.eqnset, query.specset, query.levelset
    );
    write_variables(&mut out, &r.variables);
    if !r.pin_settings.dps.is_empty() {
        out.push_str("Supplies:\n");
        for (supply, values) in &r.pin_settings.dps {
            let _ = writeln!(out, "  {supply}: {}", settings(values));
        }
    }
    if !r.pin_settings.pins.is_empty() {
        out.push_str("Pins:\n");
        for (pin, values) in &r.pin_settings.pins {
            let _ = writeln!(out, "  {pin}: {}", settings(values));
        }
    }
    out
}

pub(crate) fn write_variables(out: &mut String, variables: &Variables) {
    out.push_str("Variables:\n");
    for (name, value) in variables {
        let _ = writeln!(out, "  {name} = {}", number(*value));
    }
}

fn settings(values: &SettingValues) -> String {
    values
        .iter()
        .filter_map(|(name, value)| match value {
            SettingValue::Number(v) => Some(format!("{name}={}", number(*v))),
            SettingValue::Literal(s) => Some(format!("{name}={s}")),
            SettingValue::Flag(true) => Some(name.clone()),
            SettingValue::Flag(false) => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}
