//! Reading manifests and writing outputs
//!
//! Every output goes through [`write_atomically`]: content is written to a
//! temporary file in the destination directory and renamed over the target,
//! so a failed run never leaves a partially written file behind.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::resolver::{InputManifest, ResolvedManifest};
use crate::template::{render, TemplateValues};

/// Write `bytes` to `path` through a temporary file and a rename.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a workflow input manifest (a flat JSON object), keeping key order.
///
/// The file is rendered as a template first when `templates` is not empty.
pub fn read_input_manifest(path: &Path, templates: &TemplateValues) -> Result<InputManifest> {
    debug!("Reading input manifest from {:?}", path);

    let mut content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input manifest {}", path.display()))?;
    if !templates.is_empty() {
        content = render(&content, templates)
            .with_context(|| format!("Failed to render template {}", path.display()))?;
    }
    let manifest: InputManifest = serde_json::from_str(&content)
        .with_context(|| format!("Input manifest {} is not a JSON object", path.display()))?;

    info!("Input manifest has {} entries", manifest.len());
    Ok(manifest)
}

/// Write the resolved manifest as pretty-printed JSON.
pub fn write_resolved_manifest(manifest: &ResolvedManifest, path: &Path) -> Result<()> {
    debug!("Writing resolved manifest to {:?}", path);

    let mut json = serde_json::to_string_pretty(&manifest.to_json())?;
    json.push('\n');
    write_atomically(path, json.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Resolved manifest written to {:?} ({} entries)", path, manifest.len());
    Ok(())
}

/// Write tab-separated rows without quoting.
pub fn write_tsv_rows(rows: &[Vec<String>], path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush TSV writer: {}", e.error()))?;
    write_atomically(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))
}
