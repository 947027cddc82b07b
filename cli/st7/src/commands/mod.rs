//! CLI command implementations.

pub mod init;
pub mod label;
pub mod levels;
pub mod multiport;
pub mod timing;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::manifest::St7Manifest;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Human,
    Json,
}

/// Resolve the output format (CLI flag > manifest default > human).
pub fn resolve_format(flag: Option<&str>, manifest: Option<&St7Manifest>) -> Result<Format> {
    match flag.or_else(|| manifest.and_then(|m| m.default_format())) {
        Some("human") | None => Ok(Format::Human),
        Some("json") => Ok(Format::Json),
        Some(other) => bail!("unknown output format: '{other}'. Choose: human, json"),
    }
}

/// Resolve an input file: an explicit path is taken relative to the working
/// directory, a manifest entry relative to the manifest.
pub fn setup_file(
    cwd: &Path,
    project_dir: Option<&Path>,
    flag: Option<&str>,
    manifest_entry: Option<&str>,
    what: &str,
) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(cwd.join(path));
    }
    match (project_dir, manifest_entry) {
        (Some(dir), Some(entry)) => Ok(dir.join(entry)),
        _ => bail!("no {what} file given (use --file or set [setup] {what} in st7.toml)"),
    }
}

/// Format a number the way the tester tools print levels and times.
pub(crate) fn number(value: f64) -> String {
    format!("{value:.6}")
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
