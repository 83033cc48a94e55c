//! Manifest resolution
//!
//! [`resolve_manifest`] walks a workflow input manifest, resolves every
//! placeholder through the table registry, replaces remote objects with local
//! paths and collects the transfers needed to make those paths exist. Nothing
//! is fetched or written here.

use ahash::AHashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use terraprep_config::TransferMode;
use tracing::{debug, info, warn};

use crate::errors::ManifestError;
use crate::placeholder::{parse_value, Placeholder};
use crate::planner::{plan, PlannedObject, RewriteRules};
use crate::reference::{Lookup, TableRegistry};
use crate::value::{Primitive, TypedValue};

/// Workflow inputs as read from JSON, in file order
pub type InputManifest = serde_json::Map<String, serde_json::Value>;

/// A resolved manifest value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    Value(TypedValue),
    /// Local path replacing a remote object
    Path(PathBuf),
}

impl ResolvedValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ResolvedValue::Value(value) => value.to_json(),
            ResolvedValue::Path(path) => {
                serde_json::Value::String(path.to_string_lossy().into_owned())
            }
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            ResolvedValue::Path(path) => Some(path),
            ResolvedValue::Value(_) => None,
        }
    }
}

/// Resolved inputs in manifest order; unresolved entries are absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedManifest {
    entries: Vec<(String, ResolvedValue)>,
}

impl ResolvedManifest {
    pub fn insert(&mut self, key: &str, value: ResolvedValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// A transfer obligation for the external object fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Remote object, or remote directory in directory mode
    pub source: String,
    /// Directory handed to the fetcher
    pub destination_directory: PathBuf,
    /// Local path that exists once the transfer succeeds
    pub destination: PathBuf,
}

/// Knobs for a resolution run
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub destination_root: PathBuf,
    /// Per-table destination roots, joined onto `destination_root`
    pub table_destinations: BTreeMap<String, PathBuf>,
    pub inspect_secondary_files: bool,
    pub no_clobber: bool,
    pub transfer: TransferMode,
}

impl ResolveOptions {
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        ResolveOptions {
            destination_root: destination_root.into(),
            table_destinations: BTreeMap::new(),
            inspect_secondary_files: true,
            no_clobber: false,
            transfer: TransferMode::Object,
        }
    }

    /// Destination root for values that came from `table`.
    pub fn root_for(&self, table: Option<&str>) -> PathBuf {
        table
            .and_then(|name| self.table_destinations.get(name))
            .map_or_else(
                || self.destination_root.clone(),
                |dir| self.destination_root.join(dir),
            )
    }
}

/// Everything a resolution run produced
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub manifest: ResolvedManifest,
    /// Keys dropped because their value could not be resolved
    pub dropped: Vec<String>,
    rules: RewriteRules,
    downloads: Vec<Download>,
    seen_destinations: AHashSet<PathBuf>,
}

impl Resolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &RewriteRules {
        &self.rules
    }

    /// Pending transfers, deduplicated by destination.
    pub fn downloads(&self) -> &[Download] {
        &self.downloads
    }

    /// Plan a raw value under `destination_root`.
    ///
    /// Returns the local path for a remote object (recording its rule and
    /// transfers), or `None` when the value is not remote.
    pub fn plan_value(
        &mut self,
        value: &str,
        destination_root: &Path,
        options: &ResolveOptions,
    ) -> Result<Option<PathBuf>, ManifestError> {
        let Some(plan) = plan(
            value,
            destination_root,
            &mut self.rules,
            options.inspect_secondary_files,
        )?
        else {
            return Ok(None);
        };

        for object in &plan.objects {
            self.record_download(object, options);
        }
        Ok(Some(plan.local_path))
    }

    /// Plan every remote line of a file list under the destination root.
    /// Returns how many transfers were added.
    pub fn plan_file_list_entries(
        &mut self,
        content: &str,
        options: &ResolveOptions,
    ) -> Result<usize, ManifestError> {
        let before = self.downloads.len();
        for entry in crate::file_list::remote_entries(content) {
            self.plan_value(entry, &options.destination_root, options)?;
        }
        Ok(self.downloads.len() - before)
    }

    fn record_download(&mut self, object: &PlannedObject, options: &ResolveOptions) {
        let download = match options.transfer {
            TransferMode::Object => Download {
                source: object.source.as_str().to_string(),
                destination_directory: object.destination_directory().to_path_buf(),
                destination: object.destination.clone(),
            },
            TransferMode::Directory => {
                let local_dir = object.destination_directory().to_path_buf();
                Download {
                    source: object.source.parent().to_string(),
                    destination_directory: local_dir
                        .parent()
                        .map_or_else(|| local_dir.clone(), Path::to_path_buf),
                    destination: local_dir,
                }
            }
        };

        if self.seen_destinations.contains(&download.destination) {
            return;
        }
        self.seen_destinations.insert(download.destination.clone());

        if options.no_clobber && download.destination.exists() {
            debug!(
                "Skipping {} (exists at {:?})",
                download.source, download.destination
            );
            return;
        }
        self.downloads.push(download);
    }
}

/// Resolve a manifest against the table registry.
pub fn resolve_manifest(
    manifest: &InputManifest,
    registry: &TableRegistry,
    options: &ResolveOptions,
) -> Result<Resolution, ManifestError> {
    let mut resolution = Resolution::new();

    for (key, raw) in manifest {
        let Some((value, table)) = resolve_entry(raw, registry).map_err(|e| e.for_entry(key))?
        else {
            warn!("Dropping input '{}': no value", key);
            resolution.dropped.push(key.clone());
            continue;
        };

        let local_path = match value.as_str() {
            Some(s) => {
                let root = options.root_for(table.as_deref());
                resolution
                    .plan_value(s, &root, options)
                    .map_err(|e| e.for_entry(key))?
            }
            None => None,
        };

        let resolved = match local_path {
            Some(path) => {
                debug!("Input '{}' -> {:?}", key, path);
                ResolvedValue::Path(path)
            }
            None => ResolvedValue::Value(value),
        };
        resolution.manifest.insert(key, resolved);
    }

    info!(
        "Resolved {} inputs ({} dropped, {} transfers, {} rewrite rules)",
        resolution.manifest.len(),
        resolution.dropped.len(),
        resolution.downloads.len(),
        resolution.rules.len()
    );
    Ok(resolution)
}

/// Resolve one manifest value. `Ok(None)` means absent.
///
/// The table name is returned for values that came through a reference.
fn resolve_entry(
    raw: &serde_json::Value,
    registry: &TableRegistry,
) -> Result<Option<(TypedValue, Option<String>)>, ManifestError> {
    use serde_json::Value;

    match raw {
        Value::String(s) => match parse_value(s)? {
            Placeholder::Value(value) => Ok(Some((value, None))),
            Placeholder::Reference(reference) => match registry.lookup(&reference)? {
                Lookup::Found(value) => Ok(Some((value.clone(), Some(reference.table_name)))),
                Lookup::NotFound => {
                    debug!("{} is not set", reference);
                    Ok(None)
                }
            },
        },
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some((TypedValue::Boolean(*b), None))),
        Value::Number(n) => Ok(Some((number_primitive(n)?.into(), None))),
        Value::Array(items) => {
            let primitives = items
                .iter()
                .map(json_primitive)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some((TypedValue::Array(primitives), None)))
        }
        Value::Object(_) => Err(ManifestError::parse(
            &raw.to_string(),
            "nested objects are not supported",
        )),
    }
}

/// Integers beyond `i64` are rejected rather than widened to a lossy float.
fn number_primitive(n: &serde_json::Number) -> Result<Primitive, ManifestError> {
    if let Some(i) = n.as_i64() {
        return Ok(Primitive::Integer(i));
    }
    match n.as_f64() {
        Some(f) if !n.is_u64() => Ok(Primitive::Float(f)),
        _ => Err(ManifestError::parse(
            &n.to_string(),
            "integer does not fit in 64 signed bits",
        )),
    }
}

fn json_primitive(item: &serde_json::Value) -> Result<Primitive, ManifestError> {
    use serde_json::Value;

    match item {
        Value::String(s) => Ok(Primitive::String(s.clone())),
        Value::Bool(b) => Ok(Primitive::Boolean(*b)),
        Value::Number(n) => number_primitive(n),
        other => Err(ManifestError::parse(
            &other.to_string(),
            "only flat arrays of primitives are supported",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn manifest(value: serde_json::Value) -> InputManifest {
        match value {
            serde_json::Value::Object(map) => map,
            _ => InputManifest::new(),
        }
    }

    fn registry(pairs: &[(&str, &str)]) -> TableRegistry {
        let mut registry = TableRegistry::new();
        let table = Table::from_pairs(
            "workspace",
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), crate::value::infer(v))),
        );
        if let Ok(table) = table {
            registry.insert(table);
        }
        registry
    }

    #[test]
    fn test_reference_scenario() {
        let inputs = manifest(json!({"x": "${workspace.sample_id}"}));
        let result = resolve_manifest(
            &inputs,
            &registry(&[("sample_id", "S1")]),
            &ResolveOptions::new("/out"),
        );
        let Ok(resolution) = result else {
            panic!("resolution failed: {result:?}");
        };
        assert_eq!(resolution.manifest.to_json(), json!({"x": "S1"}));
        assert!(resolution.downloads().is_empty());
    }

    #[test]
    fn test_remote_object_scenario() {
        let inputs = manifest(json!({"y": "gs://bkt/dir/file.bam"}));
        let result = resolve_manifest(&inputs, &TableRegistry::new(), &ResolveOptions::new("/out"));
        let Ok(resolution) = result else {
            panic!("resolution failed: {result:?}");
        };

        assert_eq!(
            resolution.manifest.to_json(),
            json!({"y": "/out/bkt/dir/file.bam"})
        );
        let rules: Vec<_> = resolution.rules().iter().collect();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source_directory_uri, "gs://bkt/dir");
        assert_eq!(rules[0].destination_directory, PathBuf::from("/out/bkt/dir"));

        let sources: Vec<&str> = resolution
            .downloads()
            .iter()
            .map(|d| d.source.as_str())
            .collect();
        assert_eq!(
            sources,
            vec!["gs://bkt/dir/file.bam", "gs://bkt/dir/file.bam.bai"]
        );
        assert!(resolution
            .downloads()
            .iter()
            .all(|d| d.destination_directory == Path::new("/out/bkt/dir")));
    }

    #[test]
    fn test_absent_key_drops_only_that_entry() {
        let inputs = manifest(json!({
            "a": "${workspace.missing}",
            "b": "${workspace.sample_id}",
            "c": 3
        }));
        let result = resolve_manifest(
            &inputs,
            &registry(&[("sample_id", "S1")]),
            &ResolveOptions::new("/out"),
        );
        let Ok(resolution) = result else {
            panic!("resolution failed: {result:?}");
        };
        assert_eq!(resolution.manifest.to_json(), json!({"b": "S1", "c": 3}));
        assert_eq!(resolution.dropped, vec!["a".to_string()]);
    }

    #[test]
    fn test_unknown_table_aborts_and_names_table() {
        let inputs = manifest(json!({"ok": "1", "bad": "${nope.key}"}));
        let result = resolve_manifest(&inputs, &registry(&[]), &ResolveOptions::new("/out"));
        let Err(err) = result else {
            panic!("unknown table must abort");
        };
        let message = err.to_string();
        assert!(message.contains("nope"), "{message}");
        assert!(message.contains("bad"), "{message}");
    }

    #[test]
    fn test_partial_placeholder_aborts() {
        let inputs = manifest(json!({"x": "pre-${workspace.sample_id}"}));
        let result = resolve_manifest(
            &inputs,
            &registry(&[("sample_id", "S1")]),
            &ResolveOptions::new("/out"),
        );
        assert!(matches!(
            result,
            Err(ManifestError::Entry { ref key, ref source })
                if key == "x" && matches!(**source, ManifestError::Parse { .. })
        ));
    }

    #[test]
    fn test_literals_and_json_values_are_typed() {
        let inputs = manifest(json!({
            "int": "12",
            "float": "0.25",
            "bool": "TRUE",
            "arr": "[1,2,3]",
            "json_num": 7,
            "json_float": 1.5,
            "json_bool": false,
            "json_arr": ["a", 1],
            "null": null,
            "text": "NA12878"
        }));
        let result = resolve_manifest(&inputs, &TableRegistry::new(), &ResolveOptions::new("/out"));
        let Ok(resolution) = result else {
            panic!("resolution failed: {result:?}");
        };
        assert_eq!(
            resolution.manifest.to_json(),
            json!({
                "int": 12,
                "float": 0.25,
                "bool": true,
                "arr": [1, 2, 3],
                "json_num": 7,
                "json_float": 1.5,
                "json_bool": false,
                "json_arr": ["a", 1],
                "text": "NA12878"
            })
        );
        assert_eq!(resolution.dropped, vec!["null".to_string()]);
    }

    #[test]
    fn test_nested_values_are_rejected() {
        for value in [json!({"x": {"a": 1}}), json!({"x": [[1]]})] {
            let result = resolve_manifest(
                &manifest(value),
                &TableRegistry::new(),
                &ResolveOptions::new("/out"),
            );
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_oversized_json_integer_names_key() {
        for value in [
            json!({"big": 18_446_744_073_709_551_615_u64}),
            json!({"big": [1, 9_223_372_036_854_775_808_u64]}),
        ] {
            let result = resolve_manifest(
                &manifest(value),
                &TableRegistry::new(),
                &ResolveOptions::new("/out"),
            );
            let Err(ManifestError::Entry { key, source }) = result else {
                panic!("oversized integer should be rejected");
            };
            assert_eq!(key, "big");
            assert!(matches!(*source, ManifestError::Parse { .. }));
        }

        let inputs = manifest(json!({"max": i64::MAX, "min": i64::MIN, "f": 1.5}));
        let result = resolve_manifest(
            &inputs,
            &TableRegistry::new(),
            &ResolveOptions::new("/out"),
        );
        let Ok(resolution) = result else {
            panic!("in-range numbers should resolve");
        };
        assert_eq!(
            resolution.manifest.to_json(),
            json!({"max": i64::MAX, "min": i64::MIN, "f": 1.5})
        );
    }

    #[test]
    fn test_table_destinations_and_shared_directories() {
        let mut options = ResolveOptions::new("/base");
        options
            .table_destinations
            .insert("workspace".to_string(), PathBuf::from("workspace_data"));
        options.inspect_secondary_files = false;

        let inputs = manifest(json!({
            "ref": "${workspace.reference}",
            "other": "gs://refs/hg38/other.txt",
            "lit": "gs://lit/a/b.txt"
        }));
        let result = resolve_manifest(
            &inputs,
            &registry(&[("reference", "gs://refs/hg38/ref.txt")]),
            &options,
        );
        let Ok(resolution) = result else {
            panic!("resolution failed: {result:?}");
        };
        assert_eq!(
            resolution.manifest.to_json(),
            json!({
                "ref": "/base/workspace_data/refs/hg38/ref.txt",
                "other": "/base/workspace_data/refs/hg38/other.txt",
                "lit": "/base/lit/a/b.txt"
            })
        );
        assert_eq!(resolution.rules().len(), 2);
    }

    #[test]
    fn test_downloads_are_deduplicated_by_destination() {
        let inputs = manifest(json!({
            "a": "gs://bkt/dir/x.vcf.gz",
            "b": "gs://bkt/dir/x.vcf.gz",
            "c": "gs://bkt/dir/x.vcf.gz.tbi"
        }));
        let result = resolve_manifest(&inputs, &TableRegistry::new(), &ResolveOptions::new("/out"));
        let Ok(resolution) = result else {
            panic!("resolution failed: {result:?}");
        };
        assert_eq!(resolution.downloads().len(), 2);
    }

    #[test]
    fn test_directory_transfer_mode() {
        let mut options = ResolveOptions::new("/out");
        options.transfer = TransferMode::Directory;

        let inputs = manifest(json!({
            "a": "gs://bkt/dir/a.bam",
            "b": "gs://bkt/dir/b.txt",
            "c": "gs://bkt/other/c.txt"
        }));
        let result = resolve_manifest(&inputs, &TableRegistry::new(), &options);
        let Ok(resolution) = result else {
            panic!("resolution failed: {result:?}");
        };
        assert_eq!(
            resolution.downloads(),
            &[
                Download {
                    source: "gs://bkt/dir".to_string(),
                    destination_directory: PathBuf::from("/out/bkt"),
                    destination: PathBuf::from("/out/bkt/dir"),
                },
                Download {
                    source: "gs://bkt/other".to_string(),
                    destination_directory: PathBuf::from("/out/bkt"),
                    destination: PathBuf::from("/out/bkt/other"),
                },
            ]
        );
    }

    #[test]
    fn test_no_clobber_rerun_is_idempotent() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let mut options = ResolveOptions::new(dir.path());
        options.no_clobber = true;

        let inputs = manifest(json!({
            "x": "${workspace.sample_id}",
            "y": "gs://bkt/dir/file.bam"
        }));
        let tables = registry(&[("sample_id", "S1")]);

        let Ok(first) = resolve_manifest(&inputs, &tables, &options) else {
            panic!("first run failed");
        };
        assert_eq!(first.downloads().len(), 2);

        // Simulate the fetcher
        for download in first.downloads() {
            if fs::create_dir_all(&download.destination_directory).is_err()
                || fs::write(&download.destination, b"").is_err()
            {
                return;
            }
        }

        let Ok(second) = resolve_manifest(&inputs, &tables, &options) else {
            panic!("second run failed");
        };
        assert_eq!(first.manifest, second.manifest);
        assert!(second.downloads().is_empty());
    }

    #[test]
    fn test_plan_file_list_entries_adds_rules_and_transfers() {
        let options = ResolveOptions::new("/out");
        let mut resolution = Resolution::new();
        let added = resolution.plan_file_list_entries(
            "gs://ref/pesr/a.txt.gz\n/already/local\ngs://ref/pesr/b.txt.gz\n",
            &options,
        );
        assert!(added.is_ok_and(|n| n == 4));
        assert_eq!(resolution.rules().len(), 1);
        assert_eq!(
            resolution.rules().rewrite("gs://ref/pesr/b.txt.gz"),
            Some(PathBuf::from("/out/ref/pesr/b.txt.gz"))
        );
    }
}
