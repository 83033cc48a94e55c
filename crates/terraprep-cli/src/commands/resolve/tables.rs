//! Building the table registry for a run

use serde_yaml::Value as YamlValue;
use std::fs;
use terraprep_config::run_config::SAMPLE_TABLE;
use terraprep_config::RunConfig;
use terraprep_manifest::{
    infer_strict, render, ManifestError, Primitive, Table, TableRegistry, TemplateValues,
    TypedValue,
};

use crate::logger;

/// Load the JSON value files used to render template sources.
pub fn load_template_values(config: &RunConfig) -> Result<TemplateValues, ManifestError> {
    let mut templates = TemplateValues::new();
    for (namespace, path) in &config.template_values {
        templates.load(namespace, path)?;
    }
    Ok(templates)
}

/// Load every configured table and apply the sample overrides.
///
/// Values given in the run configuration replace same-named columns of a
/// loaded `this` table.
pub fn build_registry(
    config: &RunConfig,
    templates: &TemplateValues,
) -> Result<TableRegistry, ManifestError> {
    let mut registry = TableRegistry::new();

    for (name, spec) in config.table_specs() {
        let table = if templates.is_empty() {
            Table::load(&name, spec.path(), spec.layout())?
        } else {
            let content = fs::read_to_string(spec.path())?;
            Table::parse(&name, &render(&content, templates)?, spec.layout())?
        };
        logger::debug(&format!(
            "Loaded table '{}' ({} columns) from {}",
            name,
            table.len(),
            spec.path().display()
        ));
        registry.insert(table);
    }

    let overrides = config.sample_overrides();
    if overrides.is_empty() {
        return Ok(registry);
    }

    if registry.get(SAMPLE_TABLE).is_none() {
        registry.insert(Table::new(SAMPLE_TABLE));
    }
    if let Some(table) = registry.get_mut(SAMPLE_TABLE) {
        for (column, raw) in &overrides {
            match yaml_value(raw).map_err(|reason| {
                ManifestError::format(SAMPLE_TABLE, format!("column '{}': {}", column, reason))
            })? {
                Some(value) => table.set(column, value),
                None => logger::debug(&format!("Sample value '{}' is empty", column)),
            }
        }
    }

    Ok(registry)
}

/// Convert a configured value. Strings go through type inference; `null` is
/// absent.
fn yaml_value(raw: &YamlValue) -> Result<Option<TypedValue>, String> {
    match raw {
        YamlValue::Null => Ok(None),
        YamlValue::String(s) => infer_strict(s).map(Some).map_err(|e| e.to_string()),
        YamlValue::Sequence(items) => items
            .iter()
            .map(yaml_primitive)
            .collect::<Result<Vec<_>, _>>()
            .map(|items| Some(TypedValue::Array(items))),
        scalar => yaml_primitive(scalar).map(|p| Some(p.into())),
    }
}

fn yaml_primitive(raw: &YamlValue) -> Result<Primitive, String> {
    match raw {
        YamlValue::Bool(b) => Ok(Primitive::Boolean(*b)),
        YamlValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Primitive::Integer(i)),
            (None, Some(f)) => Ok(Primitive::Float(f)),
            (None, None) => Err(format!("unsupported number {}", n)),
        },
        YamlValue::String(s) => Ok(Primitive::String(s.clone())),
        _ => Err("only scalars and flat lists are supported".to_string()),
    }
}
