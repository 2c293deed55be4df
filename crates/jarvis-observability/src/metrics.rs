use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

pub fn metrics_path(data_dir: &Path) -> PathBuf {
    data_dir.join("metrics.jsonl")
}

pub fn append_jsonl<T: Serialize>(data_dir: &Path, obj: &T) -> Result<()> {
    std::fs::create_dir_all(data_dir).context("create data dir failed")?;
    let p = metrics_path(data_dir);
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&p)
        .with_context(|| format!("open metrics jsonl failed: {}", p.display()))?;
    let mut line = serde_json::to_string(obj).context("serialize metrics json failed")?;
    line.push('\n');
    // One write per record keeps concurrent appenders from interleaving lines.
    f.write_all(line.as_bytes())
        .context("write metrics line failed")?;
    Ok(())
}

/// Appends and reports failures on stderr instead of returning them.
pub fn append_best_effort<T: Serialize>(data_dir: &Path, kind: &str, obj: &T) {
    if let Err(e) = append_jsonl(data_dir, obj) {
        crate::safe_eprintln!("metrics append failed ({kind}): {e:#}");
    }
}
