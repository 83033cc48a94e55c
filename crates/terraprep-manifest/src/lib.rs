//! Terraprep manifest resolution
//!
//! Resolves a workflow's input manifest against named lookup tables into
//! typed values, replacing remote objects with deterministic local paths.
//!
//! - [`value`]: type inference for untyped strings
//! - [`table`]: tab-separated lookup tables
//! - [`reference`] and [`placeholder`]: `${table.key}` resolution
//! - [`planner`] and [`file_list`]: local destinations and rewrite rules
//! - [`resolver`]: the manifest-level orchestration
//! - [`template`]: `{{ namespace.key }}` rendering of template sources
//! - [`transfer`]: handing transfer obligations to an external fetcher

pub mod errors;
pub mod file_list;
pub mod io;
pub mod placeholder;
pub mod planner;
pub mod reference;
pub mod resolver;
pub mod table;
pub mod template;
pub mod transfer;
pub mod value;

pub use errors::ManifestError;
pub use placeholder::{parse_value, resolve_value, Placeholder};
pub use planner::{plan, Plan, PlannedObject, RemoteUri, RewriteRule, RewriteRules};
pub use reference::{Lookup, Reference, TableRegistry};
pub use resolver::{
    resolve_manifest, Download, InputManifest, Resolution, ResolveOptions, ResolvedManifest,
    ResolvedValue,
};
pub use table::Table;
pub use template::{render, TemplateValues};
pub use transfer::{execute_downloads, ObjectFetcher};
pub use value::{infer, infer_strict, Primitive, TypedValue};
