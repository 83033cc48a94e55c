//! `{{ namespace.key }}` templates rendered from JSON value files
//!
//! Manifest and table sources may be templates. Every `{{ ns.key }}` is
//! replaced by the value's text (strings unquoted), and
//! `{{ ns.key | tojson }}` by its JSON serialization. Rendering happens
//! before the source is parsed, so it composes with `${table.key}`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::errors::ManifestError;
use crate::reference::Reference;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const TOJSON: &str = "tojson";

/// Named JSON objects available to templates
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    namespaces: BTreeMap<String, serde_json::Map<String, serde_json::Value>>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, namespace: &str, values: serde_json::Map<String, serde_json::Value>) {
        self.namespaces.insert(namespace.to_string(), values);
    }

    /// Load a namespace from a JSON object file.
    pub fn load(&mut self, namespace: &str, path: &Path) -> Result<(), ManifestError> {
        debug!("Loading template values '{}' from {:?}", namespace, path);
        let content = fs::read_to_string(path)?;
        let values = serde_json::from_str(&content)?;
        self.insert(namespace, values);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    fn get(&self, reference: &Reference) -> Option<&serde_json::Value> {
        self.namespaces
            .get(&reference.table_name)?
            .get(&reference.key)
    }
}

/// Render every `{{ ... }}` placeholder of `template`.
///
/// An unterminated placeholder, an expression that is not `ns.key` or an
/// unknown filter is a parse error. A value missing from `values` is an
/// error naming it.
pub fn render(template: &str, values: &TemplateValues) -> Result<String, ManifestError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        output.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let end = after
            .find(CLOSE)
            .ok_or_else(|| ManifestError::parse(&rest[start..], "unterminated template placeholder"))?;
        let inner = &after[..end];

        let (expr, filter) = match inner.split_once('|') {
            Some((expr, filter)) => (expr.trim(), Some(filter.trim())),
            None => (inner.trim(), None),
        };
        let reference = Reference::parse(expr).ok_or_else(|| {
            ManifestError::parse(inner, "expected a `namespace.key` template expression")
        })?;
        let value = values
            .get(&reference)
            .ok_or_else(|| ManifestError::UndefinedTemplateValue(reference.to_string()))?;

        match filter {
            None => match value {
                serde_json::Value::String(s) => output.push_str(s),
                other => output.push_str(&other.to_string()),
            },
            Some(TOJSON) => output.push_str(&value.to_string()),
            Some(other) => {
                return Err(ManifestError::parse(
                    inner,
                    format!("unknown template filter '{}'", other),
                ))
            }
        }

        rest = &after[end + CLOSE.len()..];
    }

    output.push_str(rest);
    Ok(output)
}
