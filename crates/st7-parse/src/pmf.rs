//! Pattern master files: where to find the vector file of a label.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::context::ParserContext;
use crate::error::{read_file, ParseError, Result};

pub(crate) const HEADER: &str = "hp93000,pattern_master_file,0.1";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Section {
    #[default]
    Preamble,
    Paths,
    Files,
}

/// Per-file parser state.
#[derive(Debug, Default)]
pub struct PmfState {
    section: Section,
    path: Option<String>,
}

/// Search directories and the pattern files found in each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternMasterFile {
    /// Where the pattern master file was read from.
    pub path: Option<PathBuf>,
    /// Search directory → file names, in file order.
    pub entries: IndexMap<String, Vec<String>>,
}

impl PatternMasterFile {
    /// Number of pattern files referenced.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `directory/file`, as written.
    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().flat_map(|(dir, files)| {
            files
                .iter()
                .map(move |file| format!("{}/{file}", dir.trim_end_matches('/')))
        })
    }

    /// Candidate vector files for a label.
    ///
    /// Every file whose name contains `name` is a candidate. A `.burst` or
    /// `.binl` match is taken as the one answer. A leading `../` on a search
    /// directory is replaced by `device_dir` when given; other relative
    /// directories are taken relative to the pattern master file.
    pub fn lookup(&self, name: &str, device_dir: Option<&Path>) -> Vec<PathBuf> {
        let burst = format!("{name}.burst");
        let binl = format!("{name}.binl");
        let mut found = Vec::new();
        for (dir, files) in &self.entries {
            for file in files.iter().filter(|f| f.contains(name)) {
                let candidate = self.directory(dir, device_dir).join(file);
                if file.contains(&burst) || file.contains(&binl) {
                    return vec![candidate];
                }
                found.push(candidate);
            }
        }
        found
    }

    fn directory(&self, dir: &str, device_dir: Option<&Path>) -> PathBuf {
        if let (Some(device_dir), Some(rest)) = (device_dir, dir.strip_prefix("../")) {
            return device_dir.join(rest);
        }
        let dir = Path::new(dir);
        match self.path.as_deref().and_then(Path::parent) {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir.to_path_buf(),
        }
    }
}

/// Parse the text of a pattern master file.
pub fn parse_pmf_str(text: &str, origin: &str) -> Result<PatternMasterFile> {
    let mut ctx: ParserContext<PmfState> = ParserContext::new(origin);
    let mut pmf = PatternMasterFile::default();
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with("--"));

    match lines.next() {
        Some((_, line)) if line == HEADER => {}
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
        match line {
            "path:" => ctx.state.section = Section::Paths,
            "files:" => ctx.state.section = Section::Files,
            _ => match ctx.state.section {
                Section::Paths => {
                    pmf.entries.entry(line.to_string()).or_default();
                    ctx.state.path = Some(line.to_string());
                }
                Section::Files => {
                    let dir = ctx
                        .state
                        .path
                        .as_ref()
                        .ok_or_else(|| ctx.syntax(line, "file listed before any path"))?;
                    pmf.entries
                        .entry(dir.clone())
                        .or_default()
                        .push(line.to_string());
                }
                Section::Preamble => return Err(ctx.syntax(line, "no placement for line")),
            },
        }
    }
    Ok(pmf)
}

/// Read and parse a pattern master file.
pub fn load_pmf(path: &Path) -> Result<PatternMasterFile> {
    let text = read_file(path)?;
    let mut pmf = parse_pmf_str(&text, &path.display().to_string())?;
    pmf.path = Some(path.to_path_buf());
    Ok(pmf)
}
