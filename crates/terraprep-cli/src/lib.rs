//! terraprep: workflow input preparation
//!
//! The binary wires the configuration, logging and manifest crates to the
//! filesystem and to an external object fetcher.

pub mod commands;
pub mod common;
pub mod errors;
pub mod fetcher;

pub use common::GlobalOpts;
pub use terraprep_logger as logger;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the `tracing` subscriber for the core crates.
///
/// `RUST_LOG` wins; otherwise the filter follows the logger's verbosity.
pub fn init_tracing() {
    let level = logger::verbosity_to_filter();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "terraprep={level},terraprep_manifest={level},terraprep_config={level}"
        )
        .into()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init();
}
