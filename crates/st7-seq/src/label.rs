//! Assembly of MAIN and multi-port burst labels from vector file records.

use st7_model::{
    Container, DmaArea, Label, LabelDef, LabelKind, MainLabel, MpbLabel, MpbPort, Opcode,
    VectorFile,
};
use tracing::debug;

use crate::error::{Result, SeqError};
use crate::program::build;

/// Build the label described by a vector file.
///
/// A file holds either one MAIN label or the per-port records of one burst.
pub fn assemble(file: &VectorFile) -> Result<Label> {
    let first = file.labels.first().ok_or_else(|| SeqError::MalformedLabel {
        label: origin(file),
        detail: "no SQLB record".to_string(),
    })?;
    if file.labels.iter().any(|l| l.kind != first.kind) {
        return Err(malformed(first, "mixes MAIN and MPBU records"));
    }
    let label = match first.kind {
        LabelKind::Main => Label::Main(assemble_main(file, first)?),
        LabelKind::Mpbu => Label::Mpb(assemble_mpb(file, first)?),
    };
    debug!(label = label.name(), file = %origin(file), "assembled label");
    Ok(label)
}

fn assemble_main(file: &VectorFile, sqlb: &LabelDef) -> Result<MainLabel> {
    if !(2..=3).contains(&file.dmas.len()) {
        return Err(malformed(
            sqlb,
            format!("expected 2 or 3 DMAS records, found {}", file.dmas.len()),
        ));
    }
    if file.labels.len() != 1 {
        return Err(malformed(
            sqlb,
            format!("expected one SQLB record, found {}", file.labels.len()),
        ));
    }
    let mut sequencer = file.dmas.iter().filter(|d| d.area != DmaArea::Mtst);
    let port = sequencer
        .next()
        .map(|d| d.port.clone())
        .ok_or_else(|| malformed(sqlb, "no SQPG or PARA DMAS record"))?;
    for dmas in sequencer {
        if dmas.port != port {
            return Err(port_mismatch(sqlb, &port, &dmas.port));
        }
    }
    if sqlb.port != port {
        return Err(port_mismatch(sqlb, &port, &sqlb.port));
    }
    let expected = (sqlb.stop.saturating_sub(sqlb.start) + 1) as usize;
    if file.instructions.len() != expected {
        return Err(malformed(
            sqlb,
            format!(
                "SQLB spans {expected} commands but {} SQPG records were read",
                file.instructions.len()
            ),
        ));
    }

    let program = build(&sqlb.name, &port, &file.instructions, sqlb.start..=sqlb.stop)?;
    Ok(MainLabel {
        name: sqlb.name.clone(),
        path: file.path.clone(),
        port,
        start: sqlb.start,
        stop: sqlb.stop,
        wavetable: sqlb.wavetable_or_sync.clone(),
        program,
    })
}

fn assemble_mpb(file: &VectorFile, first: &LabelDef) -> Result<MpbLabel> {
    if file.dmas.len() != file.labels.len() {
        return Err(malformed(
            first,
            format!(
                "{} DMAS records for {} SQLB records",
                file.dmas.len(),
                file.labels.len()
            ),
        ));
    }
    let mut ports = Container::new();
    for sqlb in &file.labels {
        if sqlb.name != first.name {
            return Err(malformed(
                first,
                format!("burst records name two labels ('{}')", sqlb.name),
            ));
        }
        let dmas = file
            .dmas
            .iter()
            .find(|d| d.port == sqlb.port)
            .ok_or_else(|| malformed(sqlb, format!("port '{}' has no DMAS record", sqlb.port)))?;
        let program = build(
            &sqlb.name,
            &sqlb.port,
            file.instructions.iter().filter(|i| i.port == sqlb.port),
            sqlb.start..=sqlb.stop,
        )?;
        if let Some(other) = program
            .program
            .values()
            .find(|i| !matches!(i.opcode, Opcode::CALL | Opcode::BEND))
        {
            return Err(SeqError::UnexpectedInstruction {
                label: sqlb.name.clone(),
                port: sqlb.port.clone(),
                cmd_no: other.cmd_no,
                opcode: other.opcode,
            });
        }
        ports
            .add(MpbPort {
                name: sqlb.port.clone(),
                memory: dmas.memory.clone(),
                seq_size: dmas.size,
                sync_group: sqlb.wavetable_or_sync.clone(),
                program,
            })
            .map_err(|e| malformed(sqlb, e.to_string()))?;
    }
    Ok(MpbLabel {
        name: first.name.clone(),
        path: file.path.clone(),
        ports,
    })
}

fn origin(file: &VectorFile) -> String {
    file.path
        .as_ref()
        .map_or_else(|| "<vector text>".to_string(), |p| p.display().to_string())
}

fn malformed(sqlb: &LabelDef, detail: impl Into<String>) -> SeqError {
    SeqError::MalformedLabel {
        label: sqlb.name.clone(),
        detail: detail.into(),
    }
}

fn port_mismatch(sqlb: &LabelDef, expected: &str, found: &str) -> SeqError {
    SeqError::PortMismatch {
        label: sqlb.name.clone(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use st7_parse::parse_vector_str;

    use super::*;

    fn file(text: &str) -> VectorFile {
        parse_vector_str(text, "test.binl").unwrap()
    }

    const MAIN: &str = r#"hp93000,vector,0.1
DMAS MTST,SM,0,(pA)
DMAS SQPG,SM,4,(pA)
SQLB "main_lbl",MAIN,0,3,"wt_main",(pA)
SQPG 0,STVA,0,,,(pA)
SQPG 1,GENV,5,,,(pA)
SQPG 2,RPTV,3,4,,(pA)
SQPG 3,STOP,,,,(pA)
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
    fn main_label_from_records() {
        let label = match assemble(&file(MAIN)).unwrap() {
            Label::Main(l) => l,
            other => panic!("expected MAIN label, got {}", other.name()),
        };
        assert_eq!(label.name, "main_lbl");
        assert_eq!(label.port, "pA");
        assert_eq!(label.wavetable, "wt_main");
        assert_eq!((label.program.vectors, label.program.cycles), (8, 17));
    }

    #[test]
    fn burst_label_from_records() {
        let label = match assemble(&file(MPB)).unwrap() {
            Label::Mpb(l) => l,
            other => panic!("expected burst label, got {}", other.name()),
        };
        assert_eq!(label.name, "burst");
        assert_eq!(label.ports.len(), 2);
        let pb = label.ports.get(&"pB".to_string()).unwrap();
        assert_eq!(pb.seq_size, 3);
        assert_eq!(pb.sync_group, "grp");
        let calls: Vec<&str> = pb.program.program.values().filter_map(|i| i.call_target()).collect();
        assert_eq!(calls, vec!["lbl_b", "lbl_c"]);
    }

    #[test]
    fn main_label_needs_two_or_three_dmas() {
        let text = MAIN.replace("DMAS MTST,SM,0,(pA)\n", "");
        let mut f = file(&text);
        assert!(assemble(&f).is_err());
        f.dmas.clear();
        let err = assemble(&f).unwrap_err();
        assert!(err.to_string().contains("expected 2 or 3 DMAS records, found 0"));
    }

    #[test]
    fn main_label_ports_must_agree() {
        let text = MAIN.replace("SQLB \"main_lbl\",MAIN,0,3,\"wt_main\",(pA)", "SQLB \"main_lbl\",MAIN,0,3,\"wt_main\",(pB)");
        let err = assemble(&file(&text)).unwrap_err();
        assert!(matches!(err, SeqError::PortMismatch { .. }));
    }

    #[test]
    fn main_label_command_count_checked() {
        let text = MAIN.replace(",MAIN,0,3,", ",MAIN,0,5,");
        let err = assemble(&file(&text)).unwrap_err();
        assert!(err.to_string().contains("SQLB spans 6 commands but 4 SQPG records were read"));
    }

    #[test]
    fn burst_port_needs_dmas() {
        let text = MPB.replace("DMAS SQPG,SM,3,(pB)", "DMAS SQPG,SM,3,(pC)");
        let err = assemble(&file(&text)).unwrap_err();
        assert!(err.to_string().contains("port 'pB' has no DMAS record"));
    }

    #[test]
    fn burst_allows_only_call_and_bend() {
        let text = MPB.replace("SQPG 1,CALL,,\"lbl_c\",,(pB)", "SQPG 1,GENV,4,,,(pB)");
        let err = assemble(&file(&text)).unwrap_err();
        assert!(matches!(
            err,
            SeqError::UnexpectedInstruction { cmd_no: 1, opcode: Opcode::GENV, .. }
        ));
    }

    #[test]
    fn empty_file_is_malformed() {
        let err = assemble(&VectorFile::default()).unwrap_err();
        assert_eq!(err.to_string(), "malformed label '<vector text>': no SQLB record");
    }
}
