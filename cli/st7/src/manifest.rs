//! `st7.toml` manifest parsing and device configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use st7_model::PinTopology;

/// Name of the manifest file.
pub const MANIFEST_FILE: &str = "st7.toml";

/// The top-level manifest structure for a device setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct St7Manifest {
    /// Device metadata (required).
    pub device: DeviceConfig,
    /// Where the levels, timing and pattern files live.
    #[serde(default)]
    pub setup: SetupConfig,
    /// Pins, supplies and ports.
    #[serde(default)]
    pub topology: Option<TopologyConfig>,
    /// Output defaults.
    #[serde(default)]
    pub output: Option<OutputConfig>,
}

/// Device metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    /// Device directory, used for `../` entries of pattern master files.
    /// Relative to the manifest; defaults to the manifest's directory.
    #[serde(default)]
    pub dir: Option<String>,
}

/// Setup files, relative to the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Levels file or levels master file.
    #[serde(default)]
    pub levels: Option<String>,
    /// Timing file or timing master file.
    #[serde(default)]
    pub timing: Option<String>,
    /// Pattern master file.
    #[serde(default)]
    pub patterns: Option<String>,
}

/// Pin topology section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub pins: Vec<String>,
    #[serde(default)]
    pub supplies: Vec<String>,
    /// Port → pins. The catch-all port `@` is implicit.
    #[serde(default)]
    pub ports: IndexMap<String, Vec<String>>,
}

/// Output section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `human` or `json`.
    #[serde(default)]
    pub format: Option<String>,
}

impl St7Manifest {
    /// Search upward from `start_dir` for an `st7.toml` file, parse and return
    /// it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: St7Manifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing st7.toml")
    }

    /// The device directory.
    pub fn device_dir(&self, project_dir: &Path) -> PathBuf {
        match &self.device.dir {
            Some(dir) => project_dir.join(dir),
            None => project_dir.to_path_buf(),
        }
    }

    /// The default output format from the manifest.
    pub fn default_format(&self) -> Option<&str> {
        self.output.as_ref().and_then(|o| o.format.as_deref())
    }

    /// Build the pin topology; every port pin must be a listed pin.
    pub fn topology(&self) -> Result<PinTopology> {
        let Some(config) = &self.topology else {
            bail!("no [topology] section in {MANIFEST_FILE}");
        };
        let mut topology = PinTopology::new(&config.pins, &config.supplies);
        for (port, pins) in &config.ports {
            topology
                .add_port(port.as_str(), pins)
                .with_context(|| format!("port '{port}' in {MANIFEST_FILE}"))?;
        }
        Ok(topology)
    }

    /// Generate the default template for `st7 init`.
    pub fn template(name: &str) -> String {
        format!(
            r#"[device]
name = "{name}"

[setup]
levels = "levels/levels.master"
timing = "timing/timing.master"
patterns = "vectors/all.pmf"

[topology]
pins = []
supplies = []

[topology.ports]

[output]
format = "human"
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let toml_str = r#"
[device]
name = "soc"
dir = "device"

[setup]
levels = "lev/levels.master"
timing = "tim/timing.master"
patterns = "vec/all.pmf"

[topology]
pins = ["A1", "A2", "B1"]
supplies = ["VDD"]

[topology.ports]
pB = ["B1"]
pA = ["A1", "A2"]

[output]
format = "json"
"#;
        let manifest = St7Manifest::from_str(toml_str).unwrap();
        assert_eq!(manifest.device.name, "soc");
        assert_eq!(manifest.setup.patterns.as_deref(), Some("vec/all.pmf"));
        assert_eq!(manifest.default_format(), Some("json"));
        assert_eq!(
            manifest.device_dir(Path::new("/proj")),
            PathBuf::from("/proj/device")
        );

        let topology = manifest.topology().unwrap();
        assert_eq!(topology.port_names().collect::<Vec<_>>(), vec!["pB", "pA"]);
        assert_eq!(topology.port_pins("pA").unwrap(), vec!["A1", "A2"]);
        assert!(topology.is_supply("VDD"));
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = St7Manifest::from_str("[device]\nname = \"minimal\"\n").unwrap();
        assert!(manifest.setup.levels.is_none());
        assert!(manifest.default_format().is_none());
        assert_eq!(manifest.device_dir(Path::new("/p")), PathBuf::from("/p"));
        assert!(manifest.topology().is_err());
    }

    #[test]
    fn port_with_unknown_pin_rejected() {
        let toml_str = r#"
[device]
name = "x"
[topology]
pins = ["A1"]
[topology.ports]
pA = ["A1", "Z9"]
"#;
        let err = St7Manifest::from_str(toml_str).unwrap().topology().unwrap_err();
        assert!(format!("{err:#}").contains("pin 'Z9 (port pA)' not found"));
    }

    #[test]
    fn reject_invalid_toml() {
        assert!(St7Manifest::from_str("this is not valid toml [[[").is_err());
        assert!(St7Manifest::from_str("[setup]\nlevels = \"x\"\n").is_err());
    }

    #[test]
    fn template_is_valid_toml() {
        let manifest = St7Manifest::from_str(&St7Manifest::template("dut")).unwrap();
        assert_eq!(manifest.device.name, "dut");
        assert_eq!(manifest.setup.timing.as_deref(), Some("timing/timing.master"));
        assert_eq!(manifest.default_format(), Some("human"));
        assert_eq!(manifest.topology().unwrap().pins().count(), 0);
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[device]\nname = \"parent\"\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (manifest, found_dir) = St7Manifest::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(manifest.device.name, "parent");
        assert_eq!(found_dir, dir.path());
    }
}
