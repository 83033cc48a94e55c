//! Lookup tables loaded from tab-separated sources
//!
//! Two layouts are understood:
//! - wide: a header row followed by exactly one row of values
//! - key/value: one `key<TAB>value` pair per row
//!
//! In both, the first column name may carry a `namespace:` prefix
//! (e.g. `workspace:cloud_sdk_docker`) which is stripped on load.

use ahash::AHashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use terraprep_config::TableLayout;
use tracing::debug;

use crate::errors::ManifestError;
use crate::value::{infer_strict, TypedValue};

/// Ordered mapping from column name to typed value
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: Arc<str>,
    namespace: Option<String>,
    columns: Vec<(Arc<str>, TypedValue)>,
    index: AHashMap<Arc<str>, usize>,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: &str) -> Self {
        Table {
            name: Arc::from(name),
            namespace: None,
            columns: Vec::new(),
            index: AHashMap::new(),
        }
    }

    /// Load a table from a TSV file.
    pub fn load(name: &str, path: &Path, layout: TableLayout) -> Result<Self, ManifestError> {
        debug!("Loading table '{}' from {:?}", name, path);
        let content = fs::read_to_string(path)?;
        Self::parse(name, &content, layout)
    }

    /// Parse a table from TSV text, inferring a type for every cell.
    pub fn parse(name: &str, content: &str, layout: TableLayout) -> Result<Self, ManifestError> {
        let rows = read_tsv_rows(content)?;
        let pairs = match resolve_layout(name, &rows, layout)? {
            TableLayout::Wide => wide_pairs(name, &rows)?,
            _ => key_value_pairs(name, &rows)?,
        };

        let mut table = Table::new(name);
        for (position, (column, raw)) in pairs.into_iter().enumerate() {
            let column = if position == 0 {
                let (namespace, stripped) = strip_namespace(&column);
                table.namespace = namespace;
                stripped
            } else {
                column
            };
            let value = infer_strict(&raw).map_err(|e| {
                ManifestError::format(name, format!("column '{}': {}", column, e))
            })?;
            table.push_unique(column, value)?;
        }

        debug!("Table '{}' has {} columns", name, table.len());
        Ok(table)
    }

    /// Build a table from already-typed pairs.
    pub fn from_pairs<I>(name: &str, pairs: I) -> Result<Self, ManifestError>
    where
        I: IntoIterator<Item = (String, TypedValue)>,
    {
        let mut table = Table::new(name);
        for (column, value) in pairs {
            table.push_unique(column, value)?;
        }
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace prefix stripped from the first column, if there was one.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn get(&self, column: &str) -> Option<&TypedValue> {
        self.index.get(column).map(|&i| &self.columns[i].1)
    }

    /// Set a column, replacing an existing value in place.
    pub fn set(&mut self, column: &str, value: TypedValue) {
        if let Some(&i) = self.index.get(column) {
            self.columns[i].1 = value;
        } else {
            let key: Arc<str> = Arc::from(column);
            self.index.insert(key.clone(), self.columns.len());
            self.columns.push((key, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.columns.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn push_unique(&mut self, column: String, value: TypedValue) -> Result<(), ManifestError> {
        if self.index.contains_key(column.as_str()) {
            return Err(ManifestError::format(
                &self.name,
                format!("duplicate column '{}'", column),
            ));
        }
        let key: Arc<str> = Arc::from(column);
        self.index.insert(key.clone(), self.columns.len());
        self.columns.push((key, value));
        Ok(())
    }
}

/// Read tab-separated rows without quote handling. Blank lines are skipped.
pub fn read_tsv_rows(content: &str) -> Result<Vec<Vec<String>>, ManifestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Split a `namespace:name` header into its parts.
///
/// Only a prefix of the exact form `\w+:\w+` is stripped; anything else is
/// returned unchanged.
pub fn strip_namespace(header: &str) -> (Option<String>, String) {
    if let Some((namespace, rest)) = header.split_once(':') {
        if is_word(namespace) && is_word(rest) {
            return (Some(namespace.to_string()), rest.to_string());
        }
    }
    (None, header.to_string())
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn resolve_layout(
    name: &str,
    rows: &[Vec<String>],
    layout: TableLayout,
) -> Result<TableLayout, ManifestError> {
    if rows.is_empty() {
        return Err(ManifestError::format(name, "no rows"));
    }
    match layout {
        TableLayout::Auto if rows.len() == 2 && rows.iter().all(|row| row.len() == 2) => {
            Err(ManifestError::format(
                name,
                "two rows of two fields read as either layout; set `layout` explicitly",
            ))
        }
        TableLayout::Auto if rows.len() == 2 => Ok(TableLayout::Wide),
        TableLayout::Auto if rows.iter().all(|row| row.len() == 2) => Ok(TableLayout::KeyValue),
        TableLayout::Auto => Err(ManifestError::format(
            name,
            "expected a header row and a value row, or key/value rows",
        )),
        explicit => Ok(explicit),
    }
}

fn wide_pairs(name: &str, rows: &[Vec<String>]) -> Result<Vec<(String, String)>, ManifestError> {
    let [header, values] = rows else {
        return Err(ManifestError::format(
            name,
            format!("expected 2 rows (header and values), found {}", rows.len()),
        ));
    };
    if header.len() != values.len() {
        return Err(ManifestError::format(
            name,
            format!(
                "header has {} columns but value row has {}",
                header.len(),
                values.len()
            ),
        ));
    }
    Ok(header.iter().cloned().zip(values.iter().cloned()).collect())
}

fn key_value_pairs(
    name: &str,
    rows: &[Vec<String>],
) -> Result<Vec<(String, String)>, ManifestError> {
    rows.iter()
        .enumerate()
        .map(|(line, row)| match row.as_slice() {
            [key, value] => Ok((key.clone(), value.clone())),
            _ => Err(ManifestError::format(
                name,
                format!("row {} has {} fields, expected 2", line + 1, row.len()),
            )),
        })
        .collect()
}
