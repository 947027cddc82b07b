//! Level and timing master files, and header-based dispatch between a plain
//! setup file and a master file.
//!
//! A master file is an index: each entry names an equation set, a
//! multi-port specification or a wave table and the file that defines it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use st7_model::{Levels, ModelError, Timing};
use tracing::{debug, warn};

use crate::common::{is_header, unquote};
use crate::context::{significant_lines, Location, ParserContext};
use crate::error::{read_file, ParseError, Result};
use crate::{levels, timing};

const LEVELS_MASTER_HEADER: &str = "hp93000,level_master_file,0.1";
const TIMING_MASTER_HEADER: &str = "hp93000,timing_master_file,0.1";

/// Which setup a master file indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterKind {
    Levels,
    Timing,
}

impl MasterKind {
    fn header(self) -> &'static str {
        match self {
            MasterKind::Levels => LEVELS_MASTER_HEADER,
            MasterKind::Timing => TIMING_MASTER_HEADER,
        }
    }

    fn accepts(self, keyword: &str) -> bool {
        match self {
            MasterKind::Levels => matches!(keyword, "EQNSET" | "TESTDATA"),
            MasterKind::Timing => matches!(keyword, "EQNSET" | "MULTIPORT_SPEC" | "WAVETABLE"),
        }
    }
}

/// One `KEY name : path` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEntry {
    pub path: String,
    /// Line of the entry in the master file.
    pub line: usize,
}

/// The entries of a level or timing master file.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterFile {
    pub kind: MasterKind,
    pub testerfile: Option<String>,
    pub eqnsets: IndexMap<u32, MasterEntry>,
    pub testdata: IndexMap<String, MasterEntry>,
    pub multiport_specs: IndexMap<String, MasterEntry>,
    pub wavetables: IndexMap<String, MasterEntry>,
}

impl MasterFile {
    fn new(kind: MasterKind) -> Self {
        Self {
            kind,
            testerfile: None,
            eqnsets: IndexMap::new(),
            testdata: IndexMap::new(),
            multiport_specs: IndexMap::new(),
            wavetables: IndexMap::new(),
        }
    }
}

/// Parse the text of a master file of the given kind.
pub fn parse_master_str(text: &str, origin: &str, kind: MasterKind) -> Result<MasterFile> {
    let testerfile = Regex::new(r"^testerfile\s*:\s*(?P<file>\S+)$")?;
    let entry = Regex::new(r"^(?P<keyword>[A-Z_]+)\s+(?P<key>[^:]+?)\s*:\s*(?P<path>\S+)$")?;

    let mut ctx: ParserContext<()> = ParserContext::new(origin);
    let mut master = MasterFile::new(kind);
    let mut lines = significant_lines(text);

    match lines.next() {
        Some((_, line)) if line == kind.header() => {}
        other => {
            return Err(ParseError::Header {
                origin: origin.to_string(),
                expected: kind.header(),
                found: other.map(|(_, l)| l.to_string()).unwrap_or_default(),
            })
        }
    }

    for (line_no, line) in lines {
        ctx.at_line(line_no);
        if let Some(caps) = testerfile.captures(line) {
            master.testerfile = Some(caps["file"].to_string());
            continue;
        }
        let caps = entry
            .captures(line)
            .filter(|caps| kind.accepts(&caps["keyword"]))
            .ok_or_else(|| ctx.syntax(line, "unsupported master file line"))?;
        let value = MasterEntry {
            path: caps["path"].to_string(),
            line: line_no,
        };
        let key = unquote(&caps["key"]);
        let duplicate = |kind: &'static str| {
            ctx.model(ModelError::Duplicate {
                kind,
                key: key.clone(),
            })
        };
        match &caps["keyword"] {
            "EQNSET" => {
                let num: u32 = key
                    .parse()
                    .map_err(|_| ctx.syntax(line, format!("invalid EQNSET number '{key}'")))?;
                if master.eqnsets.insert(num, value).is_some() {
                    return Err(duplicate("EQNSET"));
                }
            }
            "TESTDATA" => {
                if master.testdata.insert(key.clone(), value).is_some() {
                    return Err(duplicate("TESTDATA"));
                }
            }
            "MULTIPORT_SPEC" => {
                if master.multiport_specs.insert(key.clone(), value).is_some() {
                    return Err(duplicate("MULTIPORT_SPEC"));
                }
            }
            _ => {
                if master.wavetables.insert(key.clone(), value).is_some() {
                    return Err(duplicate("WAVETABLE"));
                }
            }
        }
    }
    Ok(master)
}

/// Resolve a path written in a master file against the master's directory.
///
/// `k` leading `../` segments climb `k` directories; a `../` anywhere else is
/// rejected. The resolved file must exist.
pub fn resolve_master_path(master_dir: &Path, path: &str) -> Result<PathBuf> {
    let error = |detail: String| ParseError::MasterPath {
        base: master_dir.to_path_buf(),
        path: path.to_string(),
        detail,
    };
    let climbs = path.matches("../").count();
    let resolved = if climbs == 0 {
        master_dir.join(path)
    } else {
        if !path.starts_with(&"../".repeat(climbs)) {
            return Err(error(format!("expected {climbs} leading '../'")));
        }
        let base = master_dir
            .ancestors()
            .nth(climbs)
            .ok_or_else(|| error("climbs above the root directory".to_string()))?;
        base.join(&path[3 * climbs..])
    };
    if !resolved.is_file() {
        return Err(error(format!("no such file {}", resolved.display())));
    }
    Ok(resolved)
}

/// Load a levels setup from a plain levels file or a level master file.
pub fn load_levels(path: &Path) -> Result<Levels> {
    let text = read_file(path)?;
    let origin = path.display().to_string();
    match first_line(&text) {
        Some(LEVELS_MASTER_HEADER) => {
            let master = parse_master_str(&text, &origin, MasterKind::Levels)?;
            levels_from_master(&master, path)
        }
        Some(line) if is_header(line, levels::LANGUAGE) => levels::load_levels_file(path),
        other => Err(ParseError::Header {
            origin,
            expected: "hp93000,level,0.1 or hp93000,level_master_file,0.1",
            found: other.unwrap_or_default().to_string(),
        }),
    }
}

/// Load a timing setup from a plain timing file or a timing master file.
pub fn load_timing(path: &Path) -> Result<Timing> {
    let text = read_file(path)?;
    let origin = path.display().to_string();
    match first_line(&text) {
        Some(TIMING_MASTER_HEADER) => {
            let master = parse_master_str(&text, &origin, MasterKind::Timing)?;
            timing_from_master(&master, path)
        }
        Some(line) if is_header(line, timing::LANGUAGE) => timing::load_timing_file(path),
        other => Err(ParseError::Header {
            origin,
            expected: "hp93000,timing,0.1 or hp93000,timing_master_file,0.1",
            found: other.unwrap_or_default().to_string(),
        }),
    }
}

fn first_line(text: &str) -> Option<&str> {
    significant_lines(text).next().map(|(_, line)| line)
}

fn master_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Attach a master file entry's position to a model error.
fn at_entry(master: &Path, entry: &MasterEntry) -> impl Fn(ModelError) -> ParseError {
    let location = Location {
        origin: master.display().to_string(),
        line: entry.line,
    };
    move |source| ParseError::Model {
        location: location.clone(),
        source,
    }
}

/// Parsed files, so a file referenced by several entries is read once.
struct FileCache<T> {
    files: HashMap<PathBuf, T>,
    load: fn(&Path) -> Result<T>,
}

impl<T> FileCache<T> {
    fn new(load: fn(&Path) -> Result<T>) -> Self {
        Self {
            files: HashMap::new(),
            load,
        }
    }

    fn get(&mut self, path: PathBuf) -> Result<&T> {
        match self.files.entry(path) {
            Entry::Occupied(entry) => {
                debug!(path = %entry.key().display(), "reusing parsed file");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let parsed = (self.load)(entry.key())?;
                Ok(entry.insert(parsed))
            }
        }
    }
}

fn levels_from_master(master: &MasterFile, path: &Path) -> Result<Levels> {
    let dir = master_dir(path);
    let mut files = FileCache::new(levels::load_levels_file);
    let mut result = Levels::new();
    for (&num, entry) in &master.eqnsets {
        let wrap = at_entry(path, entry);
        let file = resolve_master_path(dir, &entry.path)?;
        debug!(eqnset = num, file = %file.display(), "loading levels equation set");
        let part = files.get(file.clone())?;
        let eqnset = part.eqnsets.require(&num).map_err(&wrap)?;
        result.eqnsets.add(eqnset.clone()).map_err(&wrap)?;
        for specset in part.specsets.iter() {
            if specset.eqnset == num {
                result.specsets.add(specset.clone()).map_err(&wrap)?;
            } else {
                warn!(
                    file = %file.display(),
                    specset = %specset.id(),
                    "dropping SPECSET of another EQNSET"
                );
            }
        }
    }
    Ok(result)
}

fn timing_from_master(master: &MasterFile, path: &Path) -> Result<Timing> {
    let dir = master_dir(path);
    let mut files = FileCache::new(timing::load_timing_file);
    let mut result = Timing::new();
    for (&num, entry) in &master.eqnsets {
        let wrap = at_entry(path, entry);
        let file = resolve_master_path(dir, &entry.path)?;
        debug!(eqnset = num, file = %file.display(), "loading timing equation set");
        let part = files.get(file.clone())?;
        let eqnset = part.eqnsets.require(&num).map_err(&wrap)?;
        result.eqnsets.add(eqnset.clone()).map_err(&wrap)?;
        for specset in part.specsets.iter() {
            if specset.eqnset == num {
                result.specsets.add(specset.clone()).map_err(&wrap)?;
            } else {
                warn!(
                    file = %file.display(),
                    specset = %specset.id(),
                    "dropping SPECSET of another EQNSET"
                );
            }
        }
    }
    for (name, entry) in &master.wavetables {
        let wrap = at_entry(path, entry);
        let part = files.get(resolve_master_path(dir, &entry.path)?)?;
        let wavetable = part.wavetables.require(name).map_err(&wrap)?;
        result.wavetables.add(wavetable.clone()).map_err(&wrap)?;
    }
    for (name, entry) in &master.multiport_specs {
        let wrap = at_entry(path, entry);
        let part = files.get(resolve_master_path(dir, &entry.path)?)?;
        let spec = part.specifications.require(name).map_err(&wrap)?;
        result.specifications.add(spec.clone()).map_err(&wrap)?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use st7_model::SpecSetId;
    use std::fs;

    const LEVELS_FILE: &str = "hp93000,level,0.1
EQSP LEV,EQN,#1
EQNSET 1 \"a\"
SPECS
vdd [V]
EQNSET 2 \"b\"
SPECS
vio [V]
EQSP LEV,SPS,#1
EQNSET 1
SPECSET 1 \"typ\"
vdd 1.8 [V]
EQNSET 2
SPECSET 1 \"typ\"
vio 3.3 [V]
";

    #[test]
    fn parses_level_master_entries() {
        let text = "hp93000,level_master_file,0.1\ntesterfile : lev.master\nEQNSET 1 : ../levels/a.lev\nTESTDATA \"td\" : td.lev\n";
        let m = parse_master_str(text, "m", MasterKind::Levels).unwrap();
        assert_eq!(m.testerfile.as_deref(), Some("lev.master"));
        assert_eq!(m.eqnsets[&1].path, "../levels/a.lev");
        assert_eq!(m.eqnsets[&1].line, 3);
        assert_eq!(m.testdata["td"].path, "td.lev");
    }

    #[test]
    fn timing_entries_rejected_in_level_master() {
        let text = "hp93000,level_master_file,0.1\nWAVETABLE wt : x.tim\n";
        assert!(parse_master_str(text, "m", MasterKind::Levels).is_err());
        let text = "hp93000,timing_master_file,0.1\nWAVETABLE \"wt\" : x.tim\nMULTIPORT_SPEC mp : y.tim\n";
        let m = parse_master_str(text, "m", MasterKind::Timing).unwrap();
        assert!(m.wavetables.contains_key("wt"));
        assert!(m.multiport_specs.contains_key("mp"));
    }

    #[test]
    fn duplicate_entry_rejected() {
        let text = "hp93000,level_master_file,0.1\nEQNSET 1 : a\nEQNSET 1 : b\n";
        let err = parse_master_str(text, "m", MasterKind::Levels).unwrap_err();
        assert!(err.to_string().contains("duplicate EQNSET"));
    }

    #[test]
    fn master_paths_climb_directories() {
        let root = tempfile::tempdir().unwrap();
        let levels_dir = root.path().join("levels");
        fs::create_dir_all(&levels_dir).unwrap();
        fs::write(root.path().join("shared.lev"), "x").unwrap();
        fs::write(levels_dir.join("local.lev"), "x").unwrap();

        let up = resolve_master_path(&levels_dir, "../shared.lev").unwrap();
        assert_eq!(up, root.path().join("shared.lev"));
        let here = resolve_master_path(&levels_dir, "local.lev").unwrap();
        assert_eq!(here, levels_dir.join("local.lev"));
    }

    #[test]
    fn inner_parent_segments_rejected() {
        let root = tempfile::tempdir().unwrap();
        let err = resolve_master_path(root.path(), "a/../b.lev").unwrap_err();
        assert!(err.to_string().contains("leading '../'"));
        let err = resolve_master_path(root.path(), "missing.lev").unwrap_err();
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn load_levels_dispatches_on_header() {
        let root = tempfile::tempdir().unwrap();
        let plain = root.path().join("all.lev");
        fs::write(&plain, LEVELS_FILE).unwrap();
        let master = root.path().join("lev.master");
        fs::write(
            &master,
            "hp93000,level_master_file,0.1\ntesterfile : lev.master\nEQNSET 2 : all.lev\n",
        )
        .unwrap();

        let all = load_levels(&plain).unwrap();
        assert_eq!(all.eqnsets.len(), 2);
        assert_eq!(all.eqnsets.get(&1).unwrap().source.as_deref(), Some(plain.as_path()));

        let only = load_levels(&master).unwrap();
        assert_eq!(only.eqnsets.keys().collect::<Vec<_>>(), vec![&2]);
        assert_eq!(
            only.specsets.keys().collect::<Vec<_>>(),
            vec![&SpecSetId::new(2, 1)]
        );
    }

    #[test]
    fn load_levels_accepts_what_the_parser_accepts() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("v2.lev");
        let text = LEVELS_FILE.replacen("hp93000,level,0.1", "hp93000,level,0.2", 1);
        assert!(levels::parse_levels_str(&text, "v2.lev").is_ok());
        fs::write(&file, &text).unwrap();
        assert_eq!(load_levels(&file).unwrap().eqnsets.len(), 2);
    }

    #[test]
    fn load_levels_rejects_unknown_header() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("x.lev");
        fs::write(&file, "hp93000,vector,0.1\n").unwrap();
        assert!(matches!(load_levels(&file), Err(ParseError::Header { .. })));
    }
}
