//! `st7 timing`: resolve one single-port timing set.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use st7_resolve::{PinEdges, Resolver, TimingResolution};

use crate::commands::levels::write_variables;
use crate::commands::{number, Format};

/// Which timing setup to resolve.
#[derive(Debug, Clone, Copy)]
pub struct TimingQuery {
    pub eqnset: u32,
    pub specset: u32,
    pub timingset: u32,
}

/// Resolve and print a timing set.
pub fn run(file: &Path, query: TimingQuery, format: Format) -> Result<()> {
    print!("{}", render(file, query, format)?);
    Ok(())
}

pub(crate) fn render(file: &Path, query: TimingQuery, format: Format) -> Result<String> {
    let timing = st7_parse::load_timing(file)
        .with_context(|| format!("loading timing from {}", file.display()))?;
    let resolution = Resolver::new()?
        .resolve_timing_single_port(&timing, query.eqnset, query.specset, query.timingset)
        .with_context(|| {
            format!(
                "resolving EQNSET {} SPECSET {} TIMINGSET {}",
                query.eqnset, query.specset, query.timingset
            )
        })?;
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(&resolution)? + "\n"),
        Format::Human => Ok(human(query, &resolution)),
    }
}

fn human(query: TimingQuery, r: &TimingResolution) -> String {
    let mut out = format!(
        "Timing: EQNSET {}, SPECSET {}, TIMINGSET {}\n",
        query.eqnset, query.specset, query.timingset
    );
    write_variables(&mut out, &r.variables);
    write_edges(&mut out, &r.pin_edges, "");
    out
}

/// Period line followed by one line of edges per pin.
pub(crate) fn write_edges(out: &mut String, edges: &PinEdges, indent: &str) {
    let _ = writeln!(out, "{indent}Period: {}", number(edges.period));
    for (pin, times) in &edges.pins {
        let times = times
            .iter()
            .map(|(edge, t)| format!("{edge}={}", number(*t)))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "{indent}  {pin}: {times}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMING: &str = r#"hp93000,timing,0.1
EQSP TIM,EQN,#1
EQNSET 1 "eqn"
SPECS
t_per [ns]
EQUATIONS
half = t_per / 2
TIMINGSET 1 "cycle"
period = t_per
PINS CLK DATA
d1 = 0
d2 = half
TIMINGSET 2 "quarter"
period = fract(1, 4, t_per)
PINS CLK
d1 = 1
EQSP TIM,SPS,#1
EQNSET 1
WAVETBL "wt"
SPECSET 1 "typ"
t_per 10 [ns]
"#;

    fn query(timingset: u32) -> TimingQuery {
        TimingQuery {
            eqnset: 1,
            specset: 1,
            timingset,
        }
    }

    fn file() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.tim");
        std::fs::write(&path, TIMING).unwrap();
        (dir, path)
    }

    #[test]
    fn human_table() {
        let (_dir, path) = file();
        let out = render(&path, query(1), Format::Human).unwrap();
        assert!(out.contains("  t_per = 10\n"));
        assert!(out.contains("Period: 10\n"));
        assert!(out.contains("  CLK: d1=0 d2=5\n"));
        assert!(out.contains("  DATA: d1=0 d2=5\n"));
    }

    #[test]
    fn fract_period() {
        let (_dir, path) = file();
        let out = render(&path, query(2), Format::Json).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["pin_edges"]["period"], 2.5);
        assert_eq!(json["pin_edges"]["pins"]["CLK"]["d1"], 1.0);
    }

    #[test]
    fn missing_timingset() {
        let (_dir, path) = file();
        let err = render(&path, query(9), Format::Human).unwrap_err();
        assert!(format!("{err:#}").contains("TIMINGSET 9"));
    }
}
