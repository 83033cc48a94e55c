use crate::errors::RunError;
use crate::fetcher::CommandFetcher;
use crate::logger;
use crate::GlobalOpts;
use anyhow::Context;
use clap::Parser;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use terraprep_config::{RunConfig, Settings};
use terraprep_manifest::file_list::rewrite_file_list_in_place;
use terraprep_manifest::io::{read_input_manifest, write_resolved_manifest};
use terraprep_manifest::{execute_downloads, resolve_manifest, Download, Resolution, ResolveOptions};

mod tables;

pub use tables::{build_registry, load_template_values};

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    /// Run configuration (YAML)
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
    /// Directory holding the data directory and the output (default: current directory)
    #[arg(value_name = "BASE_DIR")]
    pub base_dir: Option<PathBuf>,
    /// Skip objects that already exist locally
    #[arg(short = 'n', long)]
    pub no_clobber: bool,
    /// Print the resolved manifest and planned transfers without fetching or writing
    #[arg(long)]
    pub dry_run: bool,
    /// Write the resolved manifest here instead of the configured output
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn handle_resolve(cmd: ResolveCommand, _opts: &GlobalOpts) -> Result<(), RunError> {
    let settings = Settings::load()?;
    let config = RunConfig::load(&cmd.config)?;
    let base_dir = match cmd.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let data_dir = base_dir.join(settings.data_dir_name());
    let output_path = cmd
        .output
        .clone()
        .unwrap_or_else(|| config.output_path(&base_dir));

    logger::step(&format!(
        "Resolving {} into {}",
        config.workflow_inputs.display(),
        data_dir.display()
    ));

    let templates = load_template_values(&config)?;
    let registry = build_registry(&config, &templates)?;
    let inputs = read_input_manifest(&config.workflow_inputs, &templates)?;
    let options = resolve_options(&config, &settings, &data_dir, cmd.no_clobber);
    let mut resolution = resolve_manifest(&inputs, &registry, &options)?;

    if cmd.dry_run {
        print_plan(&resolution, &output_path)?;
        return Ok(());
    }

    let fetched = fetch(resolution.downloads(), &settings, options.no_clobber)?;
    let lists = localize_file_lists(&config, &mut resolution, &options, &settings)?;

    write_resolved_manifest(&resolution.manifest, &output_path)?;
    logger::success(&format!(
        "Wrote {} inputs to {} ({} fetched, {} file lists rewritten, {} dropped)",
        resolution.manifest.len(),
        output_path.display(),
        fetched,
        lists,
        resolution.dropped.len()
    ));
    Ok(())
}

fn resolve_options(
    config: &RunConfig,
    settings: &Settings,
    data_dir: &Path,
    no_clobber: bool,
) -> ResolveOptions {
    let mut options = ResolveOptions::new(data_dir);
    options.table_destinations = config.table_destinations.clone();
    options.inspect_secondary_files = config.inspect_secondary_files;
    options.no_clobber = no_clobber || settings.no_clobber();
    options.transfer = config.transfer;
    options
}

/// Hand transfers to the configured fetcher. The fetcher is only located
/// when there is something to fetch.
pub(crate) fn fetch(
    downloads: &[Download],
    settings: &Settings,
    no_clobber: bool,
) -> Result<usize, RunError> {
    if downloads.is_empty() {
        return Ok(0);
    }
    let fetcher = CommandFetcher::from_settings(settings, no_clobber)?;
    Ok(execute_downloads(downloads, &fetcher)?)
}

/// Rewrite the remote entries of every configured file list to local paths,
/// fetching the listed objects first when entry planning is on.
fn localize_file_lists(
    config: &RunConfig,
    resolution: &mut Resolution,
    options: &ResolveOptions,
    settings: &Settings,
) -> Result<usize, RunError> {
    let mut rewritten = 0;

    for key in &config.file_lists {
        let path = match resolution.manifest.get(key) {
            None => {
                logger::warn(&format!(
                    "File list '{}' is not in the resolved manifest, skipping",
                    key
                ));
                continue;
            }
            Some(value) => value.as_path().map(Path::to_path_buf).ok_or_else(|| {
                RunError::InvalidArgs(format!(
                    "File list '{}' did not resolve to a local path",
                    key
                ))
            })?,
        };

        if config.plan_file_list_entries {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read file list {}", path.display()))?;
            let before = resolution.downloads().len();
            let added = resolution.plan_file_list_entries(&content, options)?;
            logger::debug(&format!("File list '{}' needs {} transfers", key, added));
            fetch(
                &resolution.downloads()[before..],
                settings,
                options.no_clobber,
            )?;
        }

        rewrite_file_list_in_place(&path, resolution.rules())?;
        logger::info(&format!("Rewrote file list '{}' at {}", key, path.display()));
        rewritten += 1;
    }

    Ok(rewritten)
}

fn print_plan(resolution: &Resolution, output_path: &Path) -> Result<(), RunError> {
    let json = serde_json::to_string_pretty(&resolution.manifest.to_json())
        .context("Failed to render resolved manifest")?;
    println!("{}", json);

    println!("{}", "Transfers:".bold().green());
    if resolution.downloads().is_empty() {
        println!("  {}", "(none)".yellow());
    }
    for download in resolution.downloads() {
        println!(
            "  {} -> {}",
            download.source.cyan(),
            download.destination_directory.display()
        );
    }

    println!("{}", "Rewrite rules:".bold().green());
    for rule in resolution.rules().iter() {
        println!(
            "  {} -> {}",
            rule.source_directory_uri.cyan(),
            rule.destination_directory.display()
        );
    }

    if !resolution.dropped.is_empty() {
        println!(
            "{} {}",
            "Dropped:".bold().yellow(),
            resolution.dropped.join(", ")
        );
    }
    println!("{} {}", "Output:".bold().green(), output_path.display());
    Ok(())
}
