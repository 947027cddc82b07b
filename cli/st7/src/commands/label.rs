//! `st7 label`: vector and cycle counts of a pattern label.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use st7_model::{Label, PinTopology, VectorFile};
use st7_parse::{load_pmf, load_vector_file, ParseError, PatternMasterFile};
use st7_seq::{
    interpret_mpb_label, main_label_rows, pin_owners, pin_rows, Cost, LabelCache, LabelSource,
    PinRow, PortCost,
};
use tracing::debug;

use crate::commands::Format;

/// Labels found through a pattern master file.
pub struct PmfSource {
    pmf: PatternMasterFile,
    device_dir: Option<PathBuf>,
}

impl PmfSource {
    pub fn load(pmf: &Path, device_dir: Option<&Path>) -> Result<Self> {
        Ok(Self {
            pmf: load_pmf(pmf).with_context(|| format!("loading {}", pmf.display()))?,
            device_dir: device_dir.map(Path::to_path_buf),
        })
    }
}

impl LabelSource for PmfSource {
    type Error = ParseError;

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        self.pmf.lookup(name, self.device_dir.as_deref())
    }

    fn read(&self, path: &Path) -> std::result::Result<VectorFile, ParseError> {
        load_vector_file(path)
    }
}

/// Cost of one label, per port and optionally per pin.
#[derive(Debug, Serialize)]
pub struct LabelReport {
    pub label: String,
    pub kind: &'static str,
    pub ports: IndexMap<String, PortCost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pins: Option<IndexMap<String, PinRow>>,
}

/// Cost and print a label.
pub fn run(
    source: &PmfSource,
    name: &str,
    topology: Option<&PinTopology>,
    format: Format,
) -> Result<()> {
    print!("{}", render(source, name, topology, format)?);
    Ok(())
}

pub(crate) fn render(
    source: &PmfSource,
    name: &str,
    topology: Option<&PinTopology>,
    format: Format,
) -> Result<String> {
    let mut cache = LabelCache::new();
    let report = report(source, &mut cache, name, topology)?;
    let stats = cache.statistics();
    debug!(
        label = name,
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        "label cache"
    );
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(&report)? + "\n"),
        Format::Human => Ok(human(&report)),
    }
}

pub(crate) fn report<S: LabelSource>(
    source: &S,
    cache: &mut LabelCache,
    name: &str,
    topology: Option<&PinTopology>,
) -> Result<LabelReport> {
    let label = cache
        .label(source, name)
        .with_context(|| format!("loading label '{name}'"))?;

    let report = match &*label {
        Label::Main(main) => {
            let mut port = PortCost::default();
            port.add_label(&main.name, Cost::from(&main.program))?;
            LabelReport {
                label: main.name.clone(),
                kind: "MAIN",
                ports: IndexMap::from([(main.port.clone(), port)]),
                pins: topology
                    .map(|t| main_label_rows(main, t))
                    .transpose()
                    .with_context(|| format!("pin rows of label '{name}'"))?,
            }
        }
        Label::Mpb(mpb) => {
            // Pin ownership is checked before any called label is costed.
            let owners = topology
                .map(|t| pin_owners(t, mpb.ports.keys().map(String::as_str)))
                .transpose()
                .with_context(|| format!("pin rows of burst '{name}'"))?;
            let ports = interpret_mpb_label(mpb, |called| cache.main_label_cost(source, called))
                .with_context(|| format!("costing burst '{name}'"))?;
            LabelReport {
                label: mpb.name.clone(),
                kind: "MPBU",
                pins: owners.map(|owners| pin_rows(owners, &ports)),
                ports,
            }
        }
    };
    Ok(report)
}

fn human(report: &LabelReport) -> String {
    let mut out = format!("Label: {} ({})\n", report.label, report.kind);
    for (port, cost) in &report.ports {
        let _ = writeln!(
            out,
            "  {port}: vectors={} cycles={} labels={}",
            cost.vectors, cost.cycles, cost.num_of_labels
        );
    }
    if let Some(pins) = &report.pins {
        out.push_str("Pins:\n");
        for (pin, row) in pins {
            let _ = writeln!(
                out,
                "  {pin} ({}): vectors={} cycles={} labels={}",
                row.port, row.vectors, row.cycles, row.num_of_labels
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn main_label(name: &str, port: &str, genv: u32, rptv: (u32, u32)) -> String {
        format!(
            "hp93000,vector,0.1
DMAS SQPG,SM,4,({port})
DMAS PARA,SM,10,({port})
SQLB \"{name}\",MAIN,0,3,\"wt\",({port})
SQPG 0,STVA,0,,,({port})
SQPG 1,GENV,{genv},,,({port})
SQPG 2,RPTV,{},{},,({port})
SQPG 3,STOP,,,,({port})
",
            rptv.0, rptv.1
        )
    }

    const BURST: &str = r#"hp93000,vector,0.1
DMAS SQPG,SM,3,(pA)
DMAS SQPG,SM,2,(pB)
SQLB "burst",MPBU,0,2,"grp",(pA)
SQLB "burst",MPBU,0,1,"grp",(pB)
SQPG 0,CALL,,"lab_a",,(pA)
SQPG 1,CALL,,"lab_b",,(pA)
SQPG 2,BEND,,,,(pA)
SQPG 0,CALL,,"lab_b",,(pB)
SQPG 1,BEND,,,,(pB)
"#;

    /// A device tree whose pattern master file points at `../vectors`.
    fn device() -> (tempfile::TempDir, PmfSource) {
        let dir = tempfile::tempdir().unwrap();
        let vectors = dir.path().join("vectors");
        fs::create_dir_all(&vectors).unwrap();
        fs::write(vectors.join("lab_a.binl"), main_label("lab_a", "pA", 5, (3, 4))).unwrap();
        fs::write(vectors.join("lab_b.binl"), main_label("lab_b", "pB", 1, (2, 10))).unwrap();
        fs::write(vectors.join("burst.burst"), BURST).unwrap();
        let pmf = vectors.join("all.pmf");
        fs::write(
            &pmf,
            "hp93000,pattern_master_file,0.1\npath:\n../vectors\nfiles:\nlab_a.binl\nlab_b.binl\nburst.burst\n",
        )
        .unwrap();
        let source = PmfSource::load(&pmf, Some(dir.path())).unwrap();
        (dir, source)
    }

    fn topology() -> PinTopology {
        let mut t = PinTopology::new(["A1", "A2", "B1"], ["VDD"]);
        t.add_port("pA", ["A1", "A2"]).unwrap();
        t.add_port("pB", ["B1"]).unwrap();
        t
    }

    #[test]
    fn main_label_cost() {
        let (_dir, source) = device();
        let out = render(&source, "lab_a", None, Format::Human).unwrap();
        assert_eq!(out, "Label: lab_a (MAIN)\n  pA: vectors=8 cycles=17 labels=1\n");
    }

    #[test]
    fn burst_cost_per_port() {
        let (_dir, source) = device();
        let report = report(&source, &mut LabelCache::new(), "burst", None).unwrap();
        assert_eq!(report.kind, "MPBU");
        assert_eq!(report.ports["pA"].vectors, 11);
        assert_eq!(report.ports["pA"].cycles, 38);
        assert_eq!(report.ports["pA"].num_of_labels, 2);
        assert_eq!(report.ports["pB"].cycles, 21);
        assert!(report.pins.is_none());
    }

    #[test]
    fn burst_rows_per_pin() {
        let (_dir, source) = device();
        let out = render(&source, "burst", Some(&topology()), Format::Json).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["pins"]["A2"]["port"], "pA");
        assert_eq!(json["pins"]["A2"]["cycles"], 38);
        assert_eq!(json["pins"]["B1"]["num_of_labels"], 1);
    }

    #[test]
    fn per_pin_rows_cost_each_call_once() {
        let (_dir, source) = device();
        let mut cache = LabelCache::new();
        let report = report(&source, &mut cache, "burst", Some(&topology())).unwrap();
        let pins = report.pins.unwrap();
        assert_eq!(pins["A1"].cycles, report.ports["pA"].cycles);
        // burst, lab_a and lab_b are loaded; only the second call of lab_b hits.
        assert_eq!(cache.statistics().misses, 3);
        assert_eq!(cache.statistics().hits, 1);
    }

    #[test]
    fn duplicate_pin_stops_costing() {
        let (_dir, source) = device();
        let mut shared = PinTopology::new(["A1", "B1"], ["VDD"]);
        shared.add_port("pA", ["A1"]).unwrap();
        shared.add_port("pB", ["A1", "B1"]).unwrap();
        let mut cache = LabelCache::new();
        let err = report(&source, &mut cache, "burst", Some(&shared)).unwrap_err();
        assert!(format!("{err:#}").contains("pin 'A1' is claimed by ports 'pA' and 'pB'"));
        assert_eq!(cache.statistics().misses, 1);
    }

    #[test]
    fn unknown_label() {
        let (_dir, source) = device();
        let err = render(&source, "nothing", None, Format::Human).unwrap_err();
        assert!(format!("{err:#}").contains("loading label 'nothing'"));
    }
}
