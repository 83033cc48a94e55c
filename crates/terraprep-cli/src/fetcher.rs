//! Object fetcher backed by the `gsutil` or `gcloud` command line tools

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use terraprep_config::{ConfigError, FetcherKind, Settings};
use terraprep_manifest::ObjectFetcher;

use crate::logger;

/// Runs one fetcher process per transfer
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    kind: FetcherKind,
    program: PathBuf,
    no_clobber: bool,
}

impl CommandFetcher {
    pub fn new(kind: FetcherKind, program: impl Into<PathBuf>, no_clobber: bool) -> Self {
        CommandFetcher {
            kind,
            program: program.into(),
            no_clobber,
        }
    }

    /// Build a fetcher from user settings, locating the executable.
    pub fn from_settings(settings: &Settings, no_clobber: bool) -> Result<Self, ConfigError> {
        let program = settings.fetcher_program()?;
        logger::debug(&format!(
            "Using {} at {}",
            settings.fetcher_kind(),
            program.display()
        ));
        Ok(Self::new(settings.fetcher_kind(), program, no_clobber))
    }

    /// Arguments for a recursive copy of `source` into `destination_directory`.
    pub fn args(&self, source: &str, destination_directory: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = match self.kind {
            FetcherKind::Gsutil => vec!["-q".into(), "-m".into(), "cp".into(), "-r".into()],
            FetcherKind::Gcloud => vec!["storage".into(), "cp".into(), "-r".into()],
        };
        if self.no_clobber {
            args.push("-n".into());
        }
        args.push(source.into());
        args.push(destination_directory.as_os_str().to_os_string());
        args
    }
}

impl ObjectFetcher for CommandFetcher {
    fn fetch(&self, source: &str, destination_directory: &Path) -> bool {
        logger::spinner_start(&format!("Fetching {}", source));

        let output = Command::new(&self.program)
            .args(self.args(source, destination_directory))
            .output();

        match output {
            Ok(output) => {
                logger::capture_output(&format!("{} cp {}", self.kind, source), &output);
                if output.status.success() {
                    logger::spinner_success(&format!("Fetched {}", source));
                    true
                } else {
                    logger::spinner_error(&format!(
                        "{} exited with {} for {}",
                        self.kind,
                        output.status.code().unwrap_or(-1),
                        source
                    ));
                    false
                }
            }
            Err(e) => {
                logger::spinner_error(&format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ));
                false
            }
        }
    }
}
