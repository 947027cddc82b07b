//! Parser for `hp93000,level,0.1` files.

use std::path::Path;

use regex::Regex;
use st7_model::levels::{is_dps_setting, is_pin_setting};
use st7_model::{LevelSet, Levels, LevelsEqnSet, Setting, SettingBlock, SpecSet};
use tracing::{debug, warn};

use crate::common::{
    is_header, is_reserved_word, parse_num, parse_specset_num, unquote, CommonGrammar,
};
use crate::context::{significant_lines, ParserContext};
use crate::error::{read_file, ParseError, Result};

pub(crate) const HEADER: &str = "hp93000,level,0.1";
pub(crate) const LANGUAGE: &str = "level";

/// Firmware commands that may follow the setup sections and are not modelled.
const FIRMWARE: &[&str] = &[
    "PSLV", "PSLR", "PSFI", "DRLV", "RCLV", "TERM", "CLMP", "LSUX", "SLDO",
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Section {
    #[default]
    Preamble,
    Equations,
    SpecSets,
}

/// Per-file parser state.
#[derive(Debug, Default)]
pub struct LevelsState {
    section: Section,
    eqnset: Option<u32>,
    levelset: Option<u32>,
}

struct Grammar {
    common: CommonGrammar,
    levelset: Regex,
    dpspins: Regex,
    pins: Regex,
    term: Regex,
}

impl Grammar {
    fn new() -> Result<Self> {
        Ok(Self {
            common: CommonGrammar::new("LEV")?,
            levelset: Regex::new(r"^LEVELSET\s+(?P<num>\d+)\s*(?P<desc>.*)$")?,
            dpspins: Regex::new(r"^DPSPINS\s+(?P<pins>.+)$")?,
            pins: Regex::new(r"^PINS\s+(?P<pins>.+)$")?,
            term: Regex::new(r"^term\s+(?P<value>\w+)$")?,
        })
    }
}

/// Parse the text of a levels file. `origin` names the input in errors.
pub fn parse_levels_str(text: &str, origin: &str) -> Result<Levels> {
    let grammar = Grammar::new()?;
    let mut ctx: ParserContext<LevelsState> = ParserContext::new(origin);
    let mut levels = Levels::new();
    let mut lines = significant_lines(text);

    match lines.next() {
        Some((_, line)) if is_header(line, LANGUAGE) => {}
        other => {
            return Err(ParseError::Header {
                origin: origin.to_string(),
                expected: HEADER,
                found: other.map(|(_, l)| l.to_string()).unwrap_or_default(),
            })
        }
    }

    for (line_no, line) in lines {
        ctx.at_line(line_no);
        parse_line(&grammar, &mut ctx, &mut levels, line)?;
    }
    debug!(
        origin,
        eqnsets = levels.eqnsets.len(),
        specsets = levels.specsets.len(),
        "parsed levels file"
    );
    Ok(levels)
}

/// Read and parse a levels file, recording it as the source of each EqnSet.
pub fn load_levels_file(path: &Path) -> Result<Levels> {
    let text = read_file(path)?;
    let mut levels = parse_levels_str(&text, &path.display().to_string())?;
    let nums: Vec<u32> = levels.eqnsets.keys().copied().collect();
    for num in nums {
        if let Some(eqnset) = levels.eqnsets.get_mut(&num) {
            eqnset.source = Some(path.to_path_buf());
        }
    }
    Ok(levels)
}

fn parse_line(
    g: &Grammar,
    ctx: &mut ParserContext<LevelsState>,
    levels: &mut Levels,
    line: &str,
) -> Result<()> {
    for construct in ["MODULATION", "PIN_ALIAS_SET"] {
        if line.starts_with(construct) {
            return Err(ctx.unsupported(line, construct));
        }
    }

    if line.starts_with("EQSP") {
        g.common.check_eqsp(ctx, line)?;
        ctx.state.section = if line.contains(",EQN,") {
            Section::Equations
        } else if line.contains(",SPS,") {
            Section::SpecSets
        } else {
            return Err(ctx.syntax(line, "unknown EQSP section"));
        };
        ctx.state.eqnset = None;
        ctx.state.levelset = None;
        return Ok(());
    }

    if line == "@" || line == "NOOP" || line.starts_with("NOOP ") {
        return Ok(());
    }
    if let Some(keyword) = FIRMWARE.iter().find(|k| line.starts_with(**k)) {
        warn!(location = %ctx.location(), "not processing {keyword} commands");
        return Ok(());
    }

    match ctx.state.section {
        Section::Equations => equations_line(g, ctx, levels, line),
        Section::SpecSets => specsets_line(g, ctx, levels, line),
        Section::Preamble => Err(ctx.syntax(line, "no placement for line")),
    }
}

fn equations_line(
    g: &Grammar,
    ctx: &mut ParserContext<LevelsState>,
    levels: &mut Levels,
    line: &str,
) -> Result<()> {
    if let Some(caps) = g.common.eqnset.captures(line) {
        let num = parse_num(ctx, line, &caps["num"])?;
        ctx.check(levels.eqnsets.add(LevelsEqnSet::new(num, unquote(&caps["desc"]))))?;
        ctx.state.eqnset = Some(num);
        ctx.state.levelset = None;
        return Ok(());
    }
    if line == "SPECS" || line == "EQUATIONS" {
        return Ok(());
    }

    let eqnset = current_eqnset(ctx, levels, line)?;

    if let Some(caps) = g.dpspins.captures(line) {
        let pins = caps["pins"].split_whitespace();
        eqnset.setups.dpsblocks.push(SettingBlock::new(pins));
        return Ok(());
    }
    if let Some(caps) = g.levelset.captures(line) {
        let num = parse_num(ctx, line, &caps["num"])?;
        ctx.check(eqnset.setups.levelsets.add(LevelSet::new(num, unquote(&caps["desc"]))))?;
        ctx.state.levelset = Some(num);
        return Ok(());
    }
    if let Some(caps) = g.pins.captures(line) {
        let pins = caps["pins"].split_whitespace();
        let levelset = current_levelset(ctx, eqnset, line)?;
        levelset.pinblocks.push(SettingBlock::new(pins));
        return Ok(());
    }
    if let Some(caps) = g.term.captures(line) {
        let block = current_pinblock(ctx, eqnset, line)?;
        return ctx.check(block.set("term", Setting::Literal(caps["value"].to_string())));
    }
    if line.starts_with("term ") {
        return Err(ctx.syntax(line, "term setting with unsupported value"));
    }
    if line == "protect" {
        let block = eqnset
            .setups
            .dpsblocks
            .last_mut()
            .ok_or_else(|| ctx.syntax(line, "'protect' without a DPSPINS block"))?;
        return ctx.check(block.set("protect", Setting::Flag(true)));
    }
    if let Some(caps) = g.common.assignment.captures(line) {
        let (name, expr) = (&caps["name"], caps["expr"].trim());
        if is_dps_setting(name) {
            let block = eqnset
                .setups
                .dpsblocks
                .last_mut()
                .ok_or_else(|| ctx.syntax(line, "DPS setting outside a DPSPINS block"))?;
            return ctx.check(block.set(name, Setting::classify(name, expr)));
        }
        if is_pin_setting(name) {
            let block = current_pinblock(ctx, eqnset, line)?;
            return ctx.check(block.set(name, Setting::classify(name, expr)));
        }
        if eqnset.accepts_equations() {
            return ctx.check(eqnset.add_equation(name, expr));
        }
        return Err(ctx.syntax(
            line,
            format!("'{name}' is neither a DPS nor a pin setting and equations are closed"),
        ));
    }
    if let Some(caps) = g.common.spec_declaration.captures(line) {
        let name = &caps["name"];
        if !is_reserved_word(name) {
            let unit = caps.name("unit").map(|m| m.as_str().trim()).unwrap_or("");
            eqnset.declare_spec(name, unit);
            return Ok(());
        }
    }
    Err(ctx.syntax(line, "no placement for line"))
}

fn specsets_line(
    g: &Grammar,
    ctx: &mut ParserContext<LevelsState>,
    levels: &mut Levels,
    line: &str,
) -> Result<()> {
    if let Some(caps) = g.common.eqnset.captures(line) {
        ctx.state.eqnset = Some(parse_num(ctx, line, &caps["num"])?);
        return Ok(());
    }
    if let Some(caps) = g.common.specset.captures(line) {
        let eqnset = ctx
            .state
            .eqnset
            .ok_or_else(|| ctx.syntax(line, "SPECSET before EQNSET"))?;
        let num = parse_specset_num(ctx, line, &caps["num"])?;
        return ctx.check(levels.specsets.add(SpecSet::new(eqnset, num, unquote(&caps["desc"]))));
    }
    if let Some(caps) = g.common.spec_values.captures(line) {
        let spec = g.common.spec_from(ctx, line, &caps)?;
        let specset = levels
            .specsets
            .last_mut()
            .ok_or_else(|| ctx.syntax(line, "spec value outside a SPECSET"))?;
        return ctx.check(specset.specs.add(spec));
    }
    Err(ctx.syntax(line, "no placement for line"))
}

fn current_eqnset<'a>(
    ctx: &ParserContext<LevelsState>,
    levels: &'a mut Levels,
    line: &str,
) -> Result<&'a mut LevelsEqnSet> {
    let num = ctx
        .state
        .eqnset
        .ok_or_else(|| ctx.syntax(line, "line outside an EQNSET"))?;
    ctx.check(levels.eqnsets.require_mut(&num))
}

fn current_levelset<'a>(
    ctx: &ParserContext<LevelsState>,
    eqnset: &'a mut LevelsEqnSet,
    line: &str,
) -> Result<&'a mut LevelSet> {
    let num = ctx
        .state
        .levelset
        .ok_or_else(|| ctx.syntax(line, "PINS outside a LEVELSET"))?;
    ctx.check(eqnset.setups.levelsets.require_mut(&num))
}

fn current_pinblock<'a>(
    ctx: &ParserContext<LevelsState>,
    eqnset: &'a mut LevelsEqnSet,
    line: &str,
) -> Result<&'a mut SettingBlock> {
    current_levelset(ctx, eqnset, line)?
        .pinblocks
        .last_mut()
        .ok_or_else(|| ctx.syntax(line, "pin setting outside a PINS block"))
}

#[cfg(test)]
mod tests {
    use st7_model::SpecSetId;

    use super::*;

    const LEVELS: &str = r#"hp93000,level,0.1
# supply and pin levels
EQSP LEV,EQN,#1
EQNSET 1 "Levels EQN"
SPECS
vdd [V]
vio [V]
EQUATIONS
half = vio / 2
DPSPINS VDD
vout = vdd
ilimit = 0.5
offcurr = ON
protect
LEVELSET 1 "nominal"
PINS A B
vih = vio
vil = 0
term vt
PINS C
vol = half
@
EQSP LEV,SPS,#1
EQNSET 1 "Levels EQN"
SPECSET 1 "typ"
vdd 1.8 1.71 1.89 [V]
vio 3.3 [V] # io supply
NOOP "7.2.0",,,
PSLV "x",(VDD)
"#;

    #[test]
    fn parses_equation_set() {
        let levels = parse_levels_str(LEVELS, "t.lev").unwrap();
        let eqn = levels.eqnsets.get(&1).unwrap();
        assert_eq!(eqn.description, "Levels EQN");
        assert_eq!(eqn.specs.keys().collect::<Vec<_>>(), vec!["vdd", "vio"]);
        assert_eq!(eqn.specs["vdd"], "V");
        assert_eq!(eqn.equations["half"], "vio / 2");
    }

    #[test]
    fn parses_dps_and_pin_blocks() {
        let levels = parse_levels_str(LEVELS, "t.lev").unwrap();
        let eqn = levels.eqnsets.get(&1).unwrap();
        let dps = &eqn.setups.dpsblocks[0];
        assert_eq!(dps.pins, vec!["VDD"]);
        assert_eq!(dps.settings["vout"], Setting::Expr("vdd".into()));
        assert_eq!(dps.settings["offcurr"], Setting::Literal("ON".into()));
        assert_eq!(dps.settings["protect"], Setting::Flag(true));

        let lvl = eqn.setups.levelsets.get(&1).unwrap();
        assert_eq!(lvl.pinblocks.len(), 2);
        assert_eq!(lvl.pinblocks[0].pins, vec!["A", "B"]);
        assert_eq!(lvl.pinblocks[0].settings["term"], Setting::Literal("vt".into()));
        assert_eq!(lvl.pinblocks[1].settings["vol"], Setting::Expr("half".into()));
    }

    #[test]
    fn parses_spec_sets() {
        let levels = parse_levels_str(LEVELS, "t.lev").unwrap();
        let ss = levels.specsets.get(&SpecSetId::new(1, 1)).unwrap();
        assert_eq!(ss.description, "typ");
        assert_eq!(ss.specs.get(&"vdd".to_string()).unwrap().actual, 1.8);
        let vio = ss.specs.get(&"vio".to_string()).unwrap();
        assert_eq!(vio.comment, "io supply");
    }

    #[test]
    fn missing_header_rejected() {
        let err = parse_levels_str("EQSP LEV,EQN,#1\n", "t.lev").unwrap_err();
        assert!(matches!(err, ParseError::Header { .. }));
    }

    #[test]
    fn equation_after_blocks_rejected() {
        let text = "hp93000,level,0.1\nEQSP LEV,EQN,#1\nEQNSET 1\nDPSPINS VDD\nfoo = 1\n";
        let err = parse_levels_str(text, "t.lev").unwrap_err();
        assert!(err.to_string().starts_with("t.lev:5:"));
        assert!(err.to_string().contains("equations are closed"));
    }

    #[test]
    fn repeated_setting_rejected() {
        let text = "hp93000,level,0.1\nEQSP LEV,EQN,#1\nEQNSET 1\nDPSPINS VDD\nvout = 1\nvout = 2\n";
        let err = parse_levels_str(text, "t.lev").unwrap_err();
        assert!(matches!(err, ParseError::Model { .. }));
    }

    #[test]
    fn unsupported_constructs_rejected() {
        let text = "hp93000,level,0.1\nEQSP LEV,EQN,#1\nMODULATION 1 \"m\"\n";
        let err = parse_levels_str(text, "t.lev").unwrap_err();
        assert!(matches!(err, ParseError::Unsupported { ref construct, .. } if construct == "MODULATION"));
    }

    #[test]
    fn malformed_eqsp_rejected() {
        let text = "hp93000,level,0.1\nEQSP LEV,EQN\n";
        assert!(parse_levels_str(text, "t.lev").is_err());
    }

    #[test]
    fn protect_needs_dps_block() {
        let text = "hp93000,level,0.1\nEQSP LEV,EQN,#1\nEQNSET 1\nprotect\n";
        let err = parse_levels_str(text, "t.lev").unwrap_err();
        assert!(err.to_string().contains("DPSPINS"));
    }

    #[test]
    fn specset_number_above_99_rejected() {
        let text = "hp93000,level,0.1\nEQSP LEV,SPS,#1\nEQNSET 1\nSPECSET 100 \"wide\"\n";
        let err = parse_levels_str(text, "t.lev").unwrap_err();
        assert!(err.to_string().starts_with("t.lev:4:"));
        assert!(err.to_string().contains("SPECSET number 100 is above 99"));
    }

    #[test]
    fn stray_line_rejected() {
        let text = "hp93000,level,0.1\nEQSP LEV,SPS,#1\nEQNSET 1\nSPECSET 1 \"x\"\n???\n";
        let err = parse_levels_str(text, "t.lev").unwrap_err();
        assert!(err.to_string().contains("no placement"));
    }
}
