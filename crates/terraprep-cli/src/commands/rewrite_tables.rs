use crate::commands::resolve::fetch;
use crate::errors::RunError;
use crate::logger;
use crate::GlobalOpts;
use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use terraprep_config::run_config::WORKSPACE_TABLE;
use terraprep_config::Settings;
use terraprep_manifest::io::write_tsv_rows;
use terraprep_manifest::table::read_tsv_rows;
use terraprep_manifest::{ManifestError, Resolution, ResolveOptions};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
pub struct RewriteTablesCommand {
    /// Directory holding the `*.tsv` tables
    #[arg(value_name = "IN_DIR")]
    pub in_dir: PathBuf,
    /// Directory the tables are written to
    #[arg(value_name = "OUT_DIR")]
    pub out_dir: PathBuf,
    /// Directory remote objects are fetched into
    #[arg(value_name = "DOWNLOAD_DIR")]
    pub download_dir: PathBuf,
    /// Tables whose remote values are localized (default: workspace)
    #[arg(long = "table", value_name = "NAME")]
    pub tables: Vec<String>,
    /// Skip objects that already exist locally
    #[arg(short = 'n', long)]
    pub no_clobber: bool,
}

/// A table scheduled for output
#[derive(Debug)]
enum Output {
    Rewritten {
        path: PathBuf,
        rows: Vec<Vec<String>>,
    },
    Copied {
        source: PathBuf,
        path: PathBuf,
    },
}

pub fn handle_rewrite_tables(
    cmd: RewriteTablesCommand,
    _opts: &GlobalOpts,
) -> Result<(), RunError> {
    let settings = Settings::load()?;
    let selected = if cmd.tables.is_empty() {
        vec![WORKSPACE_TABLE.to_string()]
    } else {
        cmd.tables.clone()
    };

    let mut options = ResolveOptions::new(&cmd.download_dir);
    options.no_clobber = cmd.no_clobber || settings.no_clobber();

    let mut resolution = Resolution::new();
    let outputs = plan_tables(&cmd, &selected, &mut resolution, &options)?;

    let fetched = fetch(resolution.downloads(), &settings, options.no_clobber)?;

    fs::create_dir_all(&cmd.out_dir)
        .with_context(|| format!("Failed to create {}", cmd.out_dir.display()))?;
    for output in &outputs {
        match output {
            Output::Rewritten { path, rows } => write_tsv_rows(rows, path)?,
            Output::Copied { source, path } => {
                fs::copy(source, path).with_context(|| {
                    format!("Failed to copy {} to {}", source.display(), path.display())
                })?;
            }
        }
    }

    logger::success(&format!(
        "Wrote {} tables to {} ({} fetched)",
        outputs.len(),
        cmd.out_dir.display(),
        fetched
    ));
    Ok(())
}

/// Read every table in the input directory and plan the selected ones.
fn plan_tables(
    cmd: &RewriteTablesCommand,
    selected: &[String],
    resolution: &mut Resolution,
    options: &ResolveOptions,
) -> Result<Vec<Output>, RunError> {
    let mut outputs = Vec::new();

    for entry in WalkDir::new(&cmd.in_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to read {}", cmd.in_dir.display()))?;
        let source = entry.path();
        if !entry.file_type().is_file() || source.extension().and_then(|e| e.to_str()) != Some("tsv")
        {
            continue;
        }
        let (Some(file_name), Some(name)) = (source.file_name(), table_name(source)) else {
            continue;
        };
        let path = cmd.out_dir.join(file_name);

        if !selected.iter().any(|s| s == name) {
            logger::debug(&format!("Copying table '{}' unchanged", name));
            outputs.push(Output::Copied {
                source: source.to_path_buf(),
                path,
            });
            continue;
        }

        let content = fs::read_to_string(source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        let rows = localize_rows(name, read_tsv_rows(&content)?, resolution, options)?;
        outputs.push(Output::Rewritten { path, rows });
    }

    for name in selected {
        let found = outputs.iter().any(|output| match output {
            Output::Rewritten { path, .. } => table_name(path) == Some(name.as_str()),
            Output::Copied { .. } => false,
        });
        if !found {
            logger::warn(&format!(
                "Table '{}' not found in {}",
                name,
                cmd.in_dir.display()
            ));
        }
    }

    Ok(outputs)
}

/// Replace remote values in the value row of a two-row table with local paths.
fn localize_rows(
    name: &str,
    mut rows: Vec<Vec<String>>,
    resolution: &mut Resolution,
    options: &ResolveOptions,
) -> Result<Vec<Vec<String>>, ManifestError> {
    if rows.len() != 2 {
        return Err(ManifestError::format(
            name,
            format!("expected 2 rows (header and values), found {}", rows.len()),
        ));
    }

    for cell in &mut rows[1] {
        let planned = resolution.plan_value(cell.trim(), &options.destination_root, options)?;
        if let Some(local) = planned {
            *cell = local.to_string_lossy().into_owned();
        }
    }
    Ok(rows)
}

fn table_name(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}
