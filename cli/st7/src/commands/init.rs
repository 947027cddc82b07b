//! `st7 init`: write a template manifest.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::{St7Manifest, MANIFEST_FILE};

/// Create `st7.toml` for device `name` in `dir`.
pub fn run(dir: &Path, name: &str) -> Result<()> {
    create_manifest(dir, name)?;
    println!("Created {MANIFEST_FILE} for device '{name}'");
    println!("  edit [setup] to point at the levels, timing and pattern master files");
    println!("  list pins and ports under [topology] for per-pin label rows");
    Ok(())
}

pub(crate) fn create_manifest(dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(MANIFEST_FILE);
    if path.exists() {
        bail!("'{}' already exists", path.display());
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    fs::write(&path, St7Manifest::template(name))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
