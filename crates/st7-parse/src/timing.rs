//! Parser for `hp93000,timing,0.1` files.
//!
//! A timing file carries up to three sections: wave tables (`EQSP TIM,WVT`),
//! equation sets with timing sets (`EQSP TIM,EQN`) and spec sets or
//! multi-port specifications (`EQSP TIM,SPS`).

use std::path::Path;

use regex::Regex;
use st7_model::{
    EdgeBlock, EdgeId, PortSet, SpecSet, Specification, Timing, TimingEqnSet, TimingSet, WaveEdge,
    WaveTable, Waveform, WaveformBlock,
};
use tracing::{debug, warn};

use crate::common::{
    is_header, is_reserved_word, parse_num, parse_specset_num, unquote, CommonGrammar,
};
use crate::context::{significant_lines, ParserContext};
use crate::error::{read_file, ParseError, Result};

pub(crate) const HEADER: &str = "hp93000,timing,0.1";
pub(crate) const LANGUAGE: &str = "timing";

const FIRMWARE: &[&str] = &["DCDT", "SPST", "PCLK", "CLKR", "BWDS", "ETDS", "TSUX", "SDSC"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Section {
    #[default]
    Preamble,
    WaveTables,
    Equations,
    SpecSets,
}

/// A `SPECIFICATION` block whose closing brace has not been seen yet.
#[derive(Debug)]
struct PendingSpecification {
    spec: Specification,
    portsets: Vec<PortSet>,
    depth: u32,
}

/// Per-file parser state.
#[derive(Debug, Default)]
pub struct TimingState {
    section: Section,
    in_statemap: bool,
    wavetable: Option<String>,
    eqnset: Option<u32>,
    timingset: Option<u32>,
    specset_wavetable: Option<String>,
    specset_check: Option<String>,
    pending: Option<PendingSpecification>,
}

struct Grammar {
    common: CommonGrammar,
    wavetbl: Regex,
    defines: Regex,
    pins: Regex,
    waveform: Regex,
    brk: Regex,
    timingset: Regex,
    period: Regex,
    edge: Regex,
    specification: Regex,
    close: Regex,
    port: Regex,
    sync: Regex,
    sequence: Regex,
    clock: Regex,
    check: Regex,
}

impl Grammar {
    fn new() -> Result<Self> {
        Ok(Self {
            common: CommonGrammar::new("TIM")?,
            wavetbl: Regex::new(r"^WAVETBL\s+(?P<name>.+)$")?,
            defines: Regex::new(r"^DEFINES\s+(?P<ports>.+)$")?,
            pins: Regex::new(r"^PINS\s+(?P<pins>.+)$")?,
            waveform: Regex::new(
                r#"^(?P<index>[0-9a-fA-F]+)\s+"(?P<edges>[^"]*)"\s*(?P<cycle>[\w.]*)$"#,
            )?,
            brk: Regex::new(r#"^brk\s+"(?P<edges>[^"]*)"$"#)?,
            timingset: Regex::new(r"^TIMINGSET\s+(?P<num>\d+)\s*(?P<desc>.*)$")?,
            period: Regex::new(r"^period\s*=\s*(?P<expr>.+)$")?,
            edge: Regex::new(r"^(?P<edge>[dr]\d+)\s*=\s*(?P<expr>.+)$")?,
            specification: Regex::new(r"^SPECIFICATION\s+(?P<name>[^{]+?)\s*(?P<brace>\{)?$")?,
            close: Regex::new(r"^\}\s*(?:#.*)?$")?,
            port: Regex::new(r"^PORT\s+(?P<name>\w+)$")?,
            sync: Regex::new(r"^SYNC(?:\s+(?P<brace>\{))?$")?,
            sequence: Regex::new(r#"^SEQUENCE\s+"(?P<group>\w+)"$"#)?,
            clock: Regex::new(r#"^CLOCK\s+"(?P<clock>\w+)"$"#)?,
            check: Regex::new(r"^CHECK\s+(?P<mode>\S+)")?,
        })
    }
}

/// Parse the text of a timing file. `origin` names the input in errors.
pub fn parse_timing_str(text: &str, origin: &str) -> Result<Timing> {
    let grammar = Grammar::new()?;
    let mut ctx: ParserContext<TimingState> = ParserContext::new(origin);
    let mut timing = Timing::new();
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

    let mut last = String::new();
    for (line_no, line) in lines {
        ctx.at_line(line_no);
        parse_line(&grammar, &mut ctx, &mut timing, line)?;
        last = line.to_string();
    }
    if let Some(pending) = &ctx.state.pending {
        return Err(ctx.syntax(
            &last,
            format!("SPECIFICATION {} is not closed", pending.spec.name),
        ));
    }
    debug!(
        origin,
        eqnsets = timing.eqnsets.len(),
        specsets = timing.specsets.len(),
        specifications = timing.specifications.len(),
        wavetables = timing.wavetables.len(),
        "parsed timing file"
    );
    Ok(timing)
}

/// Read and parse a timing file, recording it as the source of its wave
/// tables and equation sets.
pub fn load_timing_file(path: &Path) -> Result<Timing> {
    let text = read_file(path)?;
    let mut timing = parse_timing_str(&text, &path.display().to_string())?;
    let eqnsets: Vec<u32> = timing.eqnsets.keys().copied().collect();
    for num in eqnsets {
        if let Some(eqnset) = timing.eqnsets.get_mut(&num) {
            eqnset.source = Some(path.to_path_buf());
        }
    }
    let wavetables: Vec<String> = timing.wavetables.keys().cloned().collect();
    for name in wavetables {
        if let Some(wavetable) = timing.wavetables.get_mut(&name) {
            wavetable.source = Some(path.to_path_buf());
        }
    }
    Ok(timing)
}

fn parse_line(
    g: &Grammar,
    ctx: &mut ParserContext<TimingState>,
    timing: &mut Timing,
    line: &str,
) -> Result<()> {
    if line.starts_with("LOOP_") {
        return Err(ctx.unsupported(line, "SmartLoop"));
    }
    for construct in ["MODECONTEXT", "USE_PROTOCOL"] {
        if line.starts_with(construct) {
            return Err(ctx.unsupported(line, construct));
        }
    }
    if line.starts_with("NOOP") {
        return Ok(());
    }

    if ctx.state.in_statemap {
        if line.starts_with("PINS ") || line.starts_with("WAVETBL ") || line.starts_with("EQSP ") {
            ctx.state.in_statemap = false;
        } else {
            let block = current_waveform_block(ctx, timing, line)?;
            block.statemap.push(line.to_string());
            return Ok(());
        }
    }

    if line.starts_with("EQSP") {
        g.common.check_eqsp(ctx, line)?;
        if ctx.state.pending.is_some() {
            return Err(ctx.syntax(line, "section starts inside a SPECIFICATION"));
        }
        let section = if line.contains(",WVT,") {
            Section::WaveTables
        } else if line.contains(",EQN,") {
            Section::Equations
        } else if line.contains(",SPS,") {
            Section::SpecSets
        } else {
            return Err(ctx.syntax(line, "unknown EQSP section"));
        };
        ctx.state = TimingState {
            section,
            ..TimingState::default()
        };
        return Ok(());
    }

    if line.starts_with('@') {
        return Ok(());
    }
    if let Some(keyword) = FIRMWARE
        .iter()
        .find(|k| line.split_whitespace().next() == Some(**k))
    {
        warn!(location = %ctx.location(), "not processing {keyword} lines");
        return Ok(());
    }

    match ctx.state.section {
        Section::WaveTables => wavetable_line(g, ctx, timing, line),
        Section::Equations => equations_line(g, ctx, timing, line),
        Section::SpecSets => specsets_line(g, ctx, timing, line),
        Section::Preamble => Err(ctx.syntax(line, "no placement for line")),
    }
}

fn wavetable_line(
    g: &Grammar,
    ctx: &mut ParserContext<TimingState>,
    timing: &mut Timing,
    line: &str,
) -> Result<()> {
    if line == "STATEMAP" {
        current_waveform_block(ctx, timing, line)?;
        ctx.state.in_statemap = true;
        return Ok(());
    }
    if let Some(caps) = g.wavetbl.captures(line) {
        let name = unquote(&caps["name"]);
        ctx.check(timing.wavetables.add(WaveTable::new(name.clone())))?;
        ctx.state.wavetable = Some(name);
        return Ok(());
    }
    if let Some(caps) = g.defines.captures(line) {
        let wavetable = current_wavetable(ctx, timing, line)?;
        wavetable.ports = caps["ports"].split_whitespace().map(String::from).collect();
        return Ok(());
    }
    if let Some(caps) = g.pins.captures(line) {
        let wavetable = current_wavetable(ctx, timing, line)?;
        wavetable
            .blocks
            .push(WaveformBlock::new(caps["pins"].split_whitespace()));
        return Ok(());
    }

    let line = match line.strip_prefix("HRPF") {
        Some(rest) => {
            current_wavetable(ctx, timing, line)?.hrpf = true;
            rest.trim()
        }
        None => line,
    };
    if let Some(caps) = g.waveform.captures(line) {
        let waveform = Waveform {
            index: caps["index"].to_string(),
            edges: parse_wave_edges(ctx, line, &caps["edges"])?,
            device_cycle: caps["cycle"].to_string(),
        };
        let block = current_waveform_block(ctx, timing, line)?;
        return ctx.check(block.waveforms.add(waveform));
    }
    if let Some(caps) = g.brk.captures(line) {
        let edges = parse_wave_edges(ctx, line, &caps["edges"])?;
        current_waveform_block(ctx, timing, line)?.brk = edges;
        return Ok(());
    }
    Err(ctx.syntax(line, "no placement for line"))
}

/// Parse pin-scale `edge:action` pairs; `{..}` xmode groups are flattened.
fn parse_wave_edges(
    ctx: &ParserContext<TimingState>,
    line: &str,
    text: &str,
) -> Result<Vec<WaveEdge>> {
    text.replace(['{', '}'], " ")
        .split_whitespace()
        .map(|entry| {
            let (edge, action) = entry
                .split_once(':')
                .ok_or_else(|| ctx.syntax(line, format!("edge '{entry}' has no action")))?;
            Ok(WaveEdge {
                edge: ctx.check(edge.parse::<EdgeId>())?,
                action: action.trim().to_string(),
            })
        })
        .collect()
}

fn equations_line(
    g: &Grammar,
    ctx: &mut ParserContext<TimingState>,
    timing: &mut Timing,
    line: &str,
) -> Result<()> {
    if let Some(caps) = g.common.eqnset.captures(line) {
        let num = parse_num(ctx, line, &caps["num"])?;
        ctx.check(timing.eqnsets.add(TimingEqnSet::new(num, unquote(&caps["desc"]))))?;
        ctx.state.eqnset = Some(num);
        ctx.state.timingset = None;
        return Ok(());
    }
    if line == "SPECS" || line == "EQUATIONS" {
        return Ok(());
    }

    let num = ctx
        .state
        .eqnset
        .ok_or_else(|| ctx.syntax(line, "line outside an EQNSET"))?;
    let eqnset = ctx.check(timing.eqnsets.require_mut(&num))?;

    if let Some(caps) = g.timingset.captures(line) {
        let num = parse_num(ctx, line, &caps["num"])?;
        ctx.check(eqnset.setups.timingsets.add(TimingSet::new(num, unquote(&caps["desc"]))))?;
        ctx.state.timingset = Some(num);
        return Ok(());
    }
    if let Some(caps) = g.defines.captures(line) {
        eqnset.setups.ports = caps["ports"].split_whitespace().map(String::from).collect();
        return Ok(());
    }
    if let Some(caps) = g.pins.captures(line) {
        current_timingset(ctx, eqnset, line)?
            .edgeblocks
            .push(EdgeBlock::new(caps["pins"].split_whitespace()));
        return Ok(());
    }
    if let Some(caps) = g.period.captures(line) {
        let timingset = current_timingset(ctx, eqnset, line)?;
        if timingset.period.is_some() {
            return Err(ctx.syntax(line, "period defined twice"));
        }
        timingset.period = Some(caps["expr"].trim().to_string());
        return Ok(());
    }
    if ctx.state.timingset.is_some() {
        if let Some(caps) = g.edge.captures(line) {
            let edge = ctx.check(caps["edge"].parse::<EdgeId>())?;
            let block = current_timingset(ctx, eqnset, line)?
                .edgeblocks
                .last_mut()
                .ok_or_else(|| ctx.syntax(line, "edge outside a PINS block"))?;
            return ctx.check(block.set(edge, caps["expr"].trim()));
        }
    }
    if let Some(caps) = g.common.assignment.captures(line) {
        return ctx.check(eqnset.add_equation(&caps["name"], caps["expr"].trim()));
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
    ctx: &mut ParserContext<TimingState>,
    timing: &mut Timing,
    line: &str,
) -> Result<()> {
    if let Some(mut pending) = ctx.state.pending.take() {
        if specification_line(g, ctx, &mut pending, line)? {
            let PendingSpecification {
                mut spec, portsets, ..
            } = pending;
            for portset in portsets {
                if portset.port.is_empty() {
                    return Err(ctx.syntax(
                        line,
                        format!("EQNSET {} in SPECIFICATION {} has no PORT", portset.eqnset, spec.name),
                    ));
                }
                ctx.check(spec.portsets.add(portset))?;
            }
            ctx.check(timing.specifications.add(spec))?;
        } else {
            ctx.state.pending = Some(pending);
        }
        return Ok(());
    }

    if let Some(caps) = g.specification.captures(line) {
        ctx.state.pending = Some(PendingSpecification {
            spec: Specification::new(unquote(&caps["name"])),
            portsets: Vec::new(),
            depth: u32::from(caps.name("brace").is_some()),
        });
        return Ok(());
    }
    if let Some(caps) = g.common.eqnset.captures(line) {
        ctx.state.eqnset = Some(parse_num(ctx, line, &caps["num"])?);
        return Ok(());
    }
    if let Some(caps) = g.wavetbl.captures(line) {
        ctx.state.specset_wavetable = Some(unquote(&caps["name"]));
        return Ok(());
    }
    if let Some(caps) = g.check.captures(line) {
        ctx.state.specset_check = Some(caps["mode"].to_string());
        return Ok(());
    }
    if let Some(caps) = g.common.specset.captures(line) {
        let eqnset = ctx
            .state
            .eqnset
            .ok_or_else(|| ctx.syntax(line, "SPECSET before EQNSET"))?;
        let mut specset = SpecSet::new(eqnset, parse_specset_num(ctx, line, &caps["num"])?, unquote(&caps["desc"]));
        specset.wavetable = ctx.state.specset_wavetable.clone();
        specset.check = ctx.state.specset_check.clone();
        return ctx.check(timing.specsets.add(specset));
    }
    if let Some(caps) = g.common.spec_values.captures(line) {
        let spec = g.common.spec_from(ctx, line, &caps)?;
        let specset = timing
            .specsets
            .last_mut()
            .ok_or_else(|| ctx.syntax(line, "spec value outside a SPECSET"))?;
        return ctx.check(specset.specs.add(spec));
    }
    Err(ctx.syntax(line, "no placement for line"))
}

/// Feed one line to an open specification; true once its last brace closes.
fn specification_line(
    g: &Grammar,
    ctx: &ParserContext<TimingState>,
    pending: &mut PendingSpecification,
    line: &str,
) -> Result<bool> {
    if line == "{" {
        pending.depth += 1;
        return Ok(false);
    }
    if line.starts_with('{') {
        return Err(ctx.syntax(line, "unexpected text after '{'"));
    }
    if g.close.is_match(line) {
        pending.depth = pending
            .depth
            .checked_sub(1)
            .ok_or_else(|| ctx.syntax(line, "unbalanced '}'"))?;
        return Ok(pending.depth == 0);
    }
    if let Some(caps) = g.check.captures(line) {
        let mode = caps["mode"].to_string();
        match pending.portsets.last_mut() {
            Some(portset) => portset.check = Some(mode),
            None => pending.spec.check = mode,
        }
        return Ok(false);
    }
    if let Some(caps) = g.common.eqnset.captures(line) {
        pending
            .portsets
            .push(PortSet::new(parse_num(ctx, line, &caps["num"])?));
        return Ok(false);
    }
    if let Some(caps) = g.sync.captures(line) {
        if caps.name("brace").is_some() {
            pending.depth += 1;
        }
        return Ok(false);
    }

    if let Some(caps) = g.common.spec_values.captures(line) {
        let spec = g.common.spec_from(ctx, line, &caps)?;
        match pending.portsets.last_mut() {
            Some(portset) => ctx.check(portset.specs.add(spec))?,
            None => ctx.check(pending.spec.specs.add(spec))?,
        }
        return Ok(false);
    }

    let portset = pending
        .portsets
        .last_mut()
        .ok_or_else(|| ctx.syntax(line, "port setting before EQNSET"))?;
    if let Some(caps) = g.wavetbl.captures(line) {
        portset.wavetable = unquote(&caps["name"]);
    } else if let Some(caps) = g.port.captures(line) {
        portset.port = caps["name"].to_string();
    } else if line == "PHASE" || line.starts_with("PHASE ") {
        portset.phase = true;
    } else if let Some(caps) = g.sequence.captures(line) {
        portset.sequence = Some(caps["group"].to_string());
    } else if let Some(caps) = g.clock.captures(line) {
        portset.clock = Some(caps["clock"].to_string());
    } else {
        return Err(ctx.syntax(line, "no placement for line in SPECIFICATION"));
    }
    Ok(false)
}

fn current_wavetable<'a>(
    ctx: &ParserContext<TimingState>,
    timing: &'a mut Timing,
    line: &str,
) -> Result<&'a mut WaveTable> {
    let name = ctx
        .state
        .wavetable
        .clone()
        .ok_or_else(|| ctx.syntax(line, "line outside a WAVETBL"))?;
    ctx.check(timing.wavetables.require_mut(&name))
}

fn current_waveform_block<'a>(
    ctx: &ParserContext<TimingState>,
    timing: &'a mut Timing,
    line: &str,
) -> Result<&'a mut WaveformBlock> {
    current_wavetable(ctx, timing, line)?
        .blocks
        .last_mut()
        .ok_or_else(|| ctx.syntax(line, "waveform outside a PINS block"))
}

fn current_timingset<'a>(
    ctx: &ParserContext<TimingState>,
    eqnset: &'a mut TimingEqnSet,
    line: &str,
) -> Result<&'a mut TimingSet> {
    let num = ctx
        .state
        .timingset
        .ok_or_else(|| ctx.syntax(line, "line outside a TIMINGSET"))?;
    ctx.check(eqnset.setups.timingsets.require_mut(&num))
}
