//! Executing transfer obligations through an external fetcher

use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::ManifestError;
use crate::resolver::Download;

/// External collaborator that copies a remote object or directory into a
/// local directory.
pub trait ObjectFetcher {
    /// Fetch `source` into `destination_directory`, reporting success.
    fn fetch(&self, source: &str, destination_directory: &Path) -> bool;
}

/// Run every transfer in order, stopping at the first failure.
///
/// Destination directories are created beforehand. Failures are not retried.
pub fn execute_downloads<F>(downloads: &[Download], fetcher: &F) -> Result<usize, ManifestError>
where
    F: ObjectFetcher + ?Sized,
{
    for download in downloads {
        fs::create_dir_all(&download.destination_directory)?;
        info!(
            "Fetching {} into {:?}",
            download.source, download.destination_directory
        );
        if !fetcher.fetch(&download.source, &download.destination_directory) {
            warn!("Transfer failed: {}", download.source);
            return Err(ManifestError::TransferFailed {
                uri: download.source.clone(),
            });
        }
    }
    Ok(downloads.len())
}
