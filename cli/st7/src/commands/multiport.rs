//! `st7 multiport`: resolve every port of a multi-port specification.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use st7_resolve::{MultiportResolution, Resolver};

use crate::commands::timing::write_edges;
use crate::commands::{number, Format};

/// Resolve and print a multi-port specification.
pub fn run(file: &Path, specification: &str, timingsets: &[u32], format: Format) -> Result<()> {
    print!("{}", render(file, specification, timingsets, format)?);
    Ok(())
}

pub(crate) fn render(
    file: &Path,
    specification: &str,
    timingsets: &[u32],
    format: Format,
) -> Result<String> {
    let timing = st7_parse::load_timing(file)
        .with_context(|| format!("loading timing from {}", file.display()))?;
    let resolution = Resolver::new()?
        .resolve_timing_multiport(&timing, specification, timingsets)
        .with_context(|| format!("resolving specification '{specification}'"))?;
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(&resolution)? + "\n"),
        Format::Human => Ok(human(&resolution)),
    }
}

fn human(r: &MultiportResolution) -> String {
    let mut out = format!("Specification: {}\n", r.specification);
    for (port, p) in &r.ports {
        let _ = writeln!(
            out,
            "Port {port}: EQNSET {}, TIMINGSET {}, WAVETBL \"{}\"",
            p.eqnset, p.timingset, p.wavetable
        );
        let vars = p
            .variables
            .iter()
            .map(|(name, value)| format!("{name}={}", number(*value)))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "  Variables: {vars}");
        write_edges(&mut out, &p.pin_edges, "  ");
    }
    out
}
