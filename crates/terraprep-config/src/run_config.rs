use crate::errors::ConfigError;
use crate::{TableLayout, TransferMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the workspace data table.
pub const WORKSPACE_TABLE: &str = "workspace";
/// Name of the per-sample override table.
pub const SAMPLE_TABLE: &str = "this";

const DEFAULT_OUTPUT: &str = "inputs.json";

/// A lookup table source: either a bare path or a path with an explicit layout
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TableSpec {
    Path(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default)]
        layout: TableLayout,
    },
}

impl TableSpec {
    pub fn path(&self) -> &Path {
        match self {
            TableSpec::Path(path) | TableSpec::Detailed { path, .. } => path,
        }
    }

    pub fn layout(&self) -> TableLayout {
        match self {
            TableSpec::Path(_) => TableLayout::Auto,
            TableSpec::Detailed { layout, .. } => *layout,
        }
    }

    fn rebased(&self, base: &Path) -> Self {
        TableSpec::Detailed {
            path: base.join(self.path()),
            layout: self.layout(),
        }
    }
}

/// Configuration for a single resolution run (YAML)
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunConfig {
    /// Workflow input manifest (flat JSON object)
    #[serde(alias = "terra_workflow_inputs")]
    pub workflow_inputs: PathBuf,

    /// Named lookup tables
    #[serde(default)]
    pub tables: BTreeMap<String, TableSpec>,

    /// Shorthand for `tables.workspace`
    #[serde(default, alias = "terra_workspace_data")]
    pub workspace_data: Option<PathBuf>,

    /// Sample identifier exposed as `this.sample_id`
    #[serde(default)]
    pub sample_name: Option<String>,

    /// Sample alignment file exposed as `this.bam_or_cram_file`
    #[serde(default, alias = "sample_cram")]
    pub sample_file: Option<String>,

    /// Exposed as `this.requester_pays_cram`
    #[serde(default)]
    pub requester_pays: bool,

    /// Additional `this.*` values
    #[serde(default)]
    pub sample: BTreeMap<String, serde_yaml::Value>,

    /// Output manifest path, relative to the run's base directory
    #[serde(default, alias = "wdl_params")]
    pub output: Option<PathBuf>,

    /// Manifest keys whose values are line-oriented file lists
    #[serde(default)]
    pub file_lists: Vec<String>,

    /// Per-table destination roots, relative to the data directory
    #[serde(default)]
    pub table_destinations: BTreeMap<String, PathBuf>,

    #[serde(default = "default_true")]
    pub inspect_secondary_files: bool,

    #[serde(default = "default_true")]
    pub plan_file_list_entries: bool,

    #[serde(default)]
    pub transfer: TransferMode,

    /// JSON value files rendered into `{{ namespace.key }}` template
    /// placeholders of the manifest and table sources
    #[serde(default)]
    pub template_values: BTreeMap<String, PathBuf>,
}

fn default_true() -> bool {
    true
}

impl RunConfig {
    /// Load a run configuration from YAML.
    ///
    /// Relative input paths are resolved against the directory holding the
    /// configuration file. A missing extension falls back to `.yaml`/`.yml`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let resolved = if path_ref.exists() {
            path_ref.to_path_buf()
        } else {
            Self::resolve_fallback_path(path_ref)
                .ok_or_else(|| ConfigError::NotFound(path_ref.to_path_buf()))?
        };

        let content = fs::read_to_string(&resolved)?;
        let config = Self::from_yaml(&content)?;
        let base = resolved.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.rebased(base))
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// All table sources, with `workspace_data` folded into `tables`.
    ///
    /// An explicit `tables.workspace` entry wins over the shorthand.
    pub fn table_specs(&self) -> BTreeMap<String, TableSpec> {
        let mut specs = self.tables.clone();
        if let Some(path) = &self.workspace_data {
            specs
                .entry(WORKSPACE_TABLE.to_string())
                .or_insert_with(|| TableSpec::Path(path.clone()));
        }
        specs
    }

    /// Values of the sample override table in insertion order.
    pub fn sample_overrides(&self) -> Vec<(String, serde_yaml::Value)> {
        let mut values = Vec::new();
        if let Some(name) = &self.sample_name {
            values.push((
                "sample_id".to_string(),
                serde_yaml::Value::String(name.clone()),
            ));
        }
        if let Some(file) = &self.sample_file {
            values.push((
                "bam_or_cram_file".to_string(),
                serde_yaml::Value::String(file.clone()),
            ));
        }
        if self.sample_name.is_some() || self.sample_file.is_some() {
            values.push((
                "requester_pays_cram".to_string(),
                serde_yaml::Value::Bool(self.requester_pays),
            ));
        }
        for (key, value) in &self.sample {
            values.retain(|(existing, _)| existing != key);
            values.push((key.clone(), value.clone()));
        }
        values
    }

    /// Where the resolved manifest is written for a run rooted at `base_dir`.
    pub fn output_path(&self, base_dir: &Path) -> PathBuf {
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        base_dir.join(output)
    }

    fn rebased(mut self, base: &Path) -> Self {
        if base.as_os_str().is_empty() {
            return self;
        }
        self.workflow_inputs = base.join(&self.workflow_inputs);
        self.workspace_data = self.workspace_data.map(|p| base.join(p));
        for path in self.template_values.values_mut() {
            *path = base.join(&*path);
        }
        self.tables = self
            .tables
            .into_iter()
            .map(|(name, spec)| {
                let spec = spec.rebased(base);
                (name, spec)
            })
            .collect();
        self
    }

    fn resolve_fallback_path(original: &Path) -> Option<PathBuf> {
        let mut candidates = Vec::new();

        if original.extension().is_none() {
            candidates.push(original.with_extension("yaml"));
            candidates.push(original.with_extension("yml"));
        }

        candidates.into_iter().find(|candidate| candidate.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LEGACY_CONFIG: &str = r#"
terra_workflow_inputs: inputs/GATKSVPipelineSingleSample.json
terra_workspace_data: tables/workspace.tsv
sample_name: NA12878
sample_cram: /data/NA12878.final.cram
wdl_params: wdl_params.json
file_lists:
  - GATKSVPipelineSingleSample.ref_pesr_disc_files_list
"#;

    #[test]
    fn test_legacy_keys_are_accepted() {
        let config = RunConfig::from_yaml(LEGACY_CONFIG);
        let Ok(config) = config else {
            panic!("legacy config should parse: {config:?}");
        };

        assert_eq!(
            config.workflow_inputs,
            PathBuf::from("inputs/GATKSVPipelineSingleSample.json")
        );
        assert_eq!(config.output, Some(PathBuf::from("wdl_params.json")));
        assert!(config.inspect_secondary_files);
        assert!(config.plan_file_list_entries);
        assert_eq!(config.transfer, TransferMode::Object);

        let specs = config.table_specs();
        assert_eq!(
            specs.get(WORKSPACE_TABLE).map(TableSpec::path),
            Some(Path::new("tables/workspace.tsv"))
        );
    }

    #[test]
    fn test_sample_overrides_order_and_extras() {
        let yaml = r#"
workflow_inputs: inputs.json
sample_name: S1
sample_file: gs://bkt/S1.cram
sample:
  batch: b7
  sample_id: S1-renamed
"#;
        let Ok(config) = RunConfig::from_yaml(yaml) else {
            panic!("config should parse");
        };
        let keys: Vec<String> = config
            .sample_overrides()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec!["bam_or_cram_file", "requester_pays_cram", "batch", "sample_id"]
        );
    }

    #[test]
    fn test_detailed_table_spec() {
        let yaml = r#"
workflow_inputs: inputs.json
tables:
  workspace:
    path: ws.tsv
    layout: key-value
  this: sample.tsv
transfer: directory
"#;
        let Ok(config) = RunConfig::from_yaml(yaml) else {
            panic!("config should parse");
        };
        let specs = config.table_specs();
        assert_eq!(
            specs.get("workspace").map(TableSpec::layout),
            Some(TableLayout::KeyValue)
        );
        assert_eq!(specs.get("this").map(TableSpec::layout), Some(TableLayout::Auto));
        assert_eq!(config.transfer, TransferMode::Directory);
    }

    #[test]
    fn test_load_rebases_relative_paths_and_falls_back_to_yaml() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let config_path = dir.path().join("run.yaml");
        if fs::write(&config_path, LEGACY_CONFIG).is_err() {
            return;
        }

        let config = RunConfig::load(dir.path().join("run"));
        let Ok(config) = config else {
            panic!("fallback load failed: {config:?}");
        };
        assert_eq!(
            config.workflow_inputs,
            dir.path().join("inputs/GATKSVPipelineSingleSample.json")
        );
        assert_eq!(
            config.workspace_data,
            Some(dir.path().join("tables/workspace.tsv"))
        );
        assert_eq!(
            config.output_path(Path::new("/runs/a")),
            PathBuf::from("/runs/a/wdl_params.json")
        );
    }

    #[test]
    fn test_template_values_are_rebased() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let config_path = dir.path().join("run.yaml");
        let yaml = "workflow_inputs: inputs.json.tmpl\ntemplate_values:\n  dockers: values/dockers.json\n";
        if fs::write(&config_path, yaml).is_err() {
            return;
        }

        let config = RunConfig::load(&config_path);
        let Ok(config) = config else {
            panic!("load failed: {config:?}");
        };
        assert_eq!(
            config.template_values.get("dockers"),
            Some(&dir.path().join("values/dockers.json"))
        );
    }

    #[test]
    fn test_missing_config_reports_path() {
        let result = RunConfig::load("/definitely/not/here/run");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
