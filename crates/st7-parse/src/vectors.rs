//! Parser for `hp93000,vector,0.1` pattern files.
//!
//! Only the sequencer records are read: `DMAS`, `SQLB` and `SQPG`. Vector
//! data follows the sequencer program after a blank line and is never
//! touched, so reading stops at the first blank line.

use std::path::Path;

use regex::Regex;
use st7_model::{Dmas, Instruction, LabelDef, LabelKind, Opcode, VectorFile};
use tracing::debug;

use crate::common::is_header;
use crate::context::ParserContext;
use crate::error::{read_file, ParseError, Result};

pub(crate) const HEADER: &str = "hp93000,vector,0.1";
pub(crate) const LANGUAGE: &str = "vector";

/// Per-file parser state.
#[derive(Debug, Default)]
pub struct VectorState {
    main_seen: bool,
}

struct Grammar {
    dmas: Regex,
    sqlb: Regex,
    sqpg: Regex,
}

impl Grammar {
    fn new() -> Result<Self> {
        Ok(Self {
            dmas: Regex::new(
                r"^DMAS\s+(?P<area>\w+),(?P<mem>\w+),(?P<size>\d+),\((?P<port>[@\w]+)\)$",
            )?,
            sqlb: Regex::new(
                r#"^SQLB\s+"(?P<label>[^"]+)",(?P<kind>\w+),(?P<start>\d+),(?P<stop>\d+),"(?P<sync>[^"]*)"(?:,\((?P<port>[@\w]+)\))?$"#,
            )?,
            sqpg: Regex::new(
                r"^SQPG\s+(?P<cmd>\d+),(?P<instr>\w+),(?P<p1>[^,]*),(?P<p2>[^,]*),(?P<mem>[^,]*),\((?P<port>[@\w]+)\)$",
            )?,
        })
    }
}

/// Parse the sequencer records of a vector file.
pub fn parse_vector_str(text: &str, origin: &str) -> Result<VectorFile> {
    let g = Grammar::new()?;
    let mut ctx: ParserContext<VectorState> = ParserContext::new(origin);
    let mut file = VectorFile::default();
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

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
        if line.is_empty() {
            break;
        }
        ctx.at_line(line_no);
        if line.starts_with("STML") || line.starts_with("SQLA") {
            continue;
        }
        if let Some(caps) = g.dmas.captures(line) {
            file.dmas.push(Dmas {
                area: ctx.check(caps["area"].parse())?,
                memory: caps["mem"].to_string(),
                size: number(&ctx, line, &caps["size"])?,
                port: caps["port"].to_string(),
            });
            continue;
        }
        if let Some(caps) = g.sqlb.captures(line) {
            let kind: LabelKind = ctx.check(caps["kind"].parse())?;
            ctx.state.main_seen |= kind == LabelKind::Main;
            file.labels.push(LabelDef {
                name: caps["label"].to_string(),
                kind,
                start: number(&ctx, line, &caps["start"])?,
                stop: number(&ctx, line, &caps["stop"])?,
                wavetable_or_sync: caps["sync"].to_string(),
                port: caps
                    .name("port")
                    .map_or(st7_model::CATCH_ALL_PORT, |m| m.as_str())
                    .to_string(),
            });
            continue;
        }
        if let Some(caps) = g.sqpg.captures(line) {
            let opcode: Opcode = ctx.check(caps["instr"].parse())?;
            let mut instruction =
                Instruction::new(number(&ctx, line, &caps["cmd"])?, opcode, &caps["port"])
                    .with_operands(&caps["p1"], &caps["p2"]);
            instruction.memory = caps["mem"].to_string();
            file.instructions.push(instruction);
            if opcode == Opcode::STOP && ctx.state.main_seen {
                break;
            }
            continue;
        }
        return Err(ctx.syntax(line, "no placement for line"));
    }
    debug!(
        origin,
        dmas = file.dmas.len(),
        labels = file.labels.len(),
        instructions = file.instructions.len(),
        "parsed vector file"
    );
    Ok(file)
}

/// Read and parse a vector file.
pub fn load_vector_file(path: &Path) -> Result<VectorFile> {
    let text = read_file(path)?;
    let mut file = parse_vector_str(&text, &path.display().to_string())?;
    file.path = Some(path.to_path_buf());
    Ok(file)
}

fn number<S, T: std::str::FromStr>(ctx: &ParserContext<S>, line: &str, text: &str) -> Result<T> {
    text.parse()
        .map_err(|_| ctx.syntax(line, format!("invalid number '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use st7_model::DmaArea;

    const MAIN: &str = r#"hp93000,vector,0.1
DMAS MTST,SM,0,(pA)
DMAS SQPG,SM,4,(pA)
SQLB "main_lbl",MAIN,0,3,"wt_main",(pA)
SQPG 0,STVA,0,,,(pA)
SQPG 1,GENV,5,,,(pA)
SQPG 2,RPTV,3,4,,(pA)
SQPG 3,STOP,,,,(pA)
SQPG 4,GENV,1,,,(pA)

VECTOR DATA THAT IS NEVER READ
"#;

    const MPB: &str = r#"hp93000,vector,0.1
DMAS SQPG,SM,2,(pA)
DMAS SQPG,SM,3,(pB)
SQLB "burst",MPBU,0,1,"grp",(pA)
SQLB "burst",MPBU,0,2,"grp",(pB)
SQPG 0,CALL,,"lbl_a",,(pA)
SQPG 1,BEND,,,,(pA)
SQPG 0,CALL,,"lbl_b",,(pB)
SQPG 1,CALL,,"lbl_c",,(pB)
SQPG 2,BEND,,,,(pB)
"#;

    #[test]
    fn reads_main_label_records() {
        let f = parse_vector_str(MAIN, "m.binl").unwrap();
        assert_eq!(f.dmas.len(), 2);
        assert_eq!(f.dmas[1].area, DmaArea::Sqpg);
        assert_eq!(f.dmas[1].size, 4);
        assert_eq!(f.labels.len(), 1);
        assert_eq!(f.labels[0].kind, LabelKind::Main);
        assert_eq!(f.labels[0].wavetable_or_sync, "wt_main");
        assert_eq!((f.labels[0].start, f.labels[0].stop), (0, 3));
    }

    #[test]
    fn main_label_stops_after_stop() {
        let f = parse_vector_str(MAIN, "m.binl").unwrap();
        assert_eq!(f.instructions.len(), 4);
        let last = f.instructions.last().unwrap();
        assert_eq!(last.opcode, Opcode::STOP);
        assert_eq!(f.instructions[2].operand1, "3");
        assert_eq!(f.instructions[2].operand2, "4");
    }

    #[test]
    fn reads_burst_records() {
        let f = parse_vector_str(MPB, "b.burst").unwrap();
        assert_eq!(f.labels.len(), 2);
        assert_eq!(f.labels[1].port, "pB");
        assert_eq!(f.instructions.len(), 5);
        assert_eq!(f.instructions[3].call_target(), Some("lbl_c"));
    }

    #[test]
    fn label_port_defaults_to_catch_all() {
        let text = "hp93000,vector,0.1\nSQLB \"l\",MAIN,0,0,\"wt\"\n";
        let f = parse_vector_str(text, "x").unwrap();
        assert_eq!(f.labels[0].port, "@");
    }

    #[test]
    fn unknown_instruction_rejected() {
        let text = "hp93000,vector,0.1\nSQPG 0,JUMP,,,,(pA)\n";
        let err = parse_vector_str(text, "x").unwrap_err();
        assert!(matches!(err, ParseError::Model { .. }));
        assert!(err.to_string().starts_with("x:2:"));
    }

    #[test]
    fn unknown_record_rejected() {
        let text = "hp93000,vector,0.1\nWFDM 1,2\n";
        assert!(parse_vector_str(text, "x").is_err());
    }

    #[test]
    fn header_required() {
        let err = parse_vector_str("SQPG 0,STOP,,,,(pA)\n", "x").unwrap_err();
        assert!(matches!(err, ParseError::Header { .. }));
    }
}
