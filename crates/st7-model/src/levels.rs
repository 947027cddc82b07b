//! Levels setups: equation sets with level sets, pin blocks and DPS blocks.

use indexmap::IndexMap;
use serde::Serialize;

use crate::container::{Container, Keyed};
use crate::eqnset::EqnSet;
use crate::error::{ModelError, Result};
use crate::spec::SpecSet;

/// Settings that belong to a DPS (device power supply) block.
pub const DPS_RESOURCES: &[&str] = &[
    "connect_state",
    "t_ms",
    "ilimit",
    "ilimit_sink",
    "ilimit_source",
    "iout_clamp_rng",
    "offcurr",
    "disable_const_curr_check",
    "ms_const_curr_disconnect",
    "current_filter_frequency",
    "voltage_filter_frequency",
    "max_voltage_drop_force",
    "max_voltage_drop_return",
    "modulation",
    "mod_ilimit",
    "mod_trig",
    "vbump",
    "vout_b",
    "vout_bl",
    "vout",
    "vout_frc_rng",
    "vout_rise_settling",
    "vout_fall_settling",
    "vout_rise_per_volt",
    "vout_fall_per_volt",
    "vout_rise_settling_c2c",
    "vout_fall_settling_c2c",
    "vout_rise_per_volt_c2c",
    "vout_fall_per_volt_c2c",
    "ms_fast_preload",
    "protect",
];

/// Settings that belong to a pin block.
pub const PIN_RESOURCES: &[&str] = &[
    "vih", "vil", "voh", "vol", "vcl", "vch", "v3h", "vihh", "vt", "vth", "iol", "ioh", "term",
];

pub fn is_dps_setting(name: &str) -> bool {
    DPS_RESOURCES.contains(&name)
}

pub fn is_pin_setting(name: &str) -> bool {
    PIN_RESOURCES.contains(&name)
}

/// The right-hand side of a pin or DPS setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Setting {
    /// An arithmetic expression resolved against the variable closure.
    Expr(String),
    /// A value carried through verbatim (`offcurr`, `term`).
    Literal(String),
    /// A keyword flag (`protect`).
    Flag(bool),
}

impl Setting {
    /// Classify a raw `name = value` setting.
    pub fn classify(name: &str, value: &str) -> Self {
        match name {
            "offcurr" | "term" => Setting::Literal(value.trim().to_string()),
            "protect" => Setting::Flag(true),
            _ => Setting::Expr(value.trim().to_string()),
        }
    }
}

/// A group of pins (or supplies) sharing a set of settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingBlock {
    pub pins: Vec<String>,
    pub settings: IndexMap<String, Setting>,
}

impl SettingBlock {
    pub fn new<I, P>(pins: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            pins: pins.into_iter().map(Into::into).collect(),
            settings: IndexMap::new(),
        }
    }

    /// Add a setting; each setting may appear once per block.
    pub fn set(&mut self, name: impl Into<String>, value: Setting) -> Result<()> {
        let name = name.into();
        if self.settings.contains_key(&name) {
            return Err(ModelError::Duplicate {
                kind: "setting",
                key: format!("{name} for pins {}", self.pins.join(" ")),
            });
        }
        self.settings.insert(name, value);
        Ok(())
    }
}

/// Pin block of a level set.
pub type PinBlock = SettingBlock;
/// Supply block of a levels equation set.
pub type DpsBlock = SettingBlock;

/// A numbered per-pin level template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelSet {
    pub num: u32,
    pub description: String,
    pub pinblocks: Vec<PinBlock>,
}

impl LevelSet {
    pub fn new(num: u32, description: impl Into<String>) -> Self {
        Self {
            num,
            description: description.into(),
            pinblocks: Vec::new(),
        }
    }
}

impl Keyed for LevelSet {
    type Key = u32;
    const KIND: &'static str = "LEVELSET";
    fn key(&self) -> u32 {
        self.num
    }
}

/// What a levels equation set owns besides specs and equations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelSetups {
    pub levelsets: Container<LevelSet>,
    pub dpsblocks: Vec<DpsBlock>,
}

pub type LevelsEqnSet = EqnSet<LevelSetups>;

impl LevelsEqnSet {
    /// Equations may only be declared before the first DPS block or level set.
    pub fn accepts_equations(&self) -> bool {
        self.setups.dpsblocks.is_empty() && self.setups.levelsets.is_empty()
    }
}

/// Everything read from one or more levels files.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Levels {
    pub eqnsets: Container<LevelsEqnSet>,
    pub specsets: Container<SpecSet>,
}

impl Levels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another levels model into this one; keys must not collide.
    pub fn merge(&mut self, other: Levels) -> Result<()> {
        for eqnset in other.eqnsets.iter() {
            self.eqnsets.add(eqnset.clone())?;
        }
        for specset in other.specsets.iter() {
            self.specsets.add(specset.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_classification() {
        assert!(is_dps_setting("vout"));
        assert!(is_dps_setting("ilimit_source"));
        assert!(is_dps_setting("vout_fall_per_volt_c2c"));
        assert!(!is_dps_setting("vih"));
        assert!(is_pin_setting("vih"));
        assert!(is_pin_setting("term"));
        assert!(!is_pin_setting("vout"));
    }

    #[test]
    fn setting_classification() {
        assert_eq!(Setting::classify("vout", " vdd*1.1 "), Setting::Expr("vdd*1.1".into()));
        assert_eq!(Setting::classify("offcurr", "ON"), Setting::Literal("ON".into()));
        assert_eq!(Setting::classify("term", "vt"), Setting::Literal("vt".into()));
        assert_eq!(Setting::classify("protect", ""), Setting::Flag(true));
    }

    #[test]
    fn block_rejects_repeated_setting() {
        let mut b = SettingBlock::new(["P1", "P2"]);
        b.set("vih", Setting::Expr("1.0".into())).unwrap();
        let err = b.set("vih", Setting::Expr("2.0".into())).unwrap_err();
        assert!(err.to_string().contains("vih for pins P1 P2"));
    }

    #[test]
    fn equations_only_before_blocks() {
        let mut e = LevelsEqnSet::new(1, "");
        assert!(e.accepts_equations());
        e.setups.dpsblocks.push(DpsBlock::new(["VDD"]));
        assert!(!e.accepts_equations());

        let mut e = LevelsEqnSet::new(2, "");
        e.setups.levelsets.add(LevelSet::new(1, "")).unwrap();
        assert!(!e.accepts_equations());
    }

    #[test]
    fn merge_rejects_collisions() {
        let mut a = Levels::new();
        a.eqnsets.add(LevelsEqnSet::new(1, "")).unwrap();
        let mut b = Levels::new();
        b.eqnsets.add(LevelsEqnSet::new(2, "")).unwrap();
        b.specsets.add(SpecSet::new(2, 1, "")).unwrap();
        a.merge(b).unwrap();
        assert_eq!(a.eqnsets.len(), 2);
        assert_eq!(a.specsets.len(), 1);

        let mut c = Levels::new();
        c.eqnsets.add(LevelsEqnSet::new(1, "")).unwrap();
        assert!(a.merge(c).is_err());
    }
}
