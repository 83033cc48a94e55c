//! Configuration for terraprep
//!
//! Two layers live here:
//! - [`Settings`]: persistent user preferences stored as TOML
//!   (`~/.config/terraprep/terraprep.toml`).
//! - [`RunConfig`]: the YAML file describing a single resolution run.
//!
//! This crate is a leaf so that both the resolver core and the CLI can share
//! the vocabulary types ([`TransferMode`], [`TableLayout`], [`FetcherKind`]).

pub mod errors;
pub mod run_config;
pub mod settings;

pub use errors::ConfigError;
pub use run_config::{RunConfig, TableSpec};
pub use settings::{FetcherKind, Settings};

use serde::{Deserialize, Serialize};

/// Granularity of the transfer obligations emitted for planned objects.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Fetch each planned object into its destination directory.
    #[default]
    Object,
    /// Fetch each distinct source directory once, recursively.
    Directory,
}

/// Shape of a tab-separated lookup table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TableLayout {
    /// Two-row when the source has exactly two rows, key/value otherwise.
    #[default]
    Auto,
    /// A header row followed by a single row of values.
    Wide,
    /// One `key<TAB>value` pair per row.
    KeyValue,
}
