use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use include_dir::{Dir, include_dir};

static TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

const STARTER: &str = "docker-unit.yml";

/// The embedded starter suite.
pub fn starter_suite() -> Result<&'static str> {
    TEMPLATES
        .get_file(STARTER)
        .and_then(|f| f.contents_utf8())
        .context("starter template is missing from the binary")
}

/// Write the starter suite into `dir`. Refuses to overwrite unless `force`.
pub fn write_starter(dir: &Path, force: bool) -> Result<PathBuf> {
    let path = dir.join(STARTER);
    if path.exists() && !force {
        bail!("{} already exists. Use --force to overwrite.", path.display());
    }
    std::fs::write(&path, starter_suite()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
