use std::path::PathBuf;

use anyhow::{anyhow, Result};

pub const DATA_DIR_ENV: &str = "JARVIS_DATA_DIR";

pub fn data_dir() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(DATA_DIR_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }
    // Dev default: workspace-root/tmp/jarvis-data
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = dir
        .ancestors()
        .nth(2)
        .ok_or_else(|| anyhow!("failed to locate workspace root"))?;
    Ok(root.join("tmp").join("jarvis-data"))
}
