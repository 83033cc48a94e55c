//! Dotted references into named tables

use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::errors::ManifestError;
use crate::table::Table;
use crate::value::TypedValue;

/// Pointer to a cell in a named table (`table.key`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub table_name: String,
    pub key: String,
}

impl Reference {
    pub fn new(table_name: impl Into<String>, key: impl Into<String>) -> Self {
        Reference {
            table_name: table_name.into(),
            key: key.into(),
        }
    }

    /// Parse `IDENT.IDENT`, where an identifier is ASCII letters, digits and
    /// underscores not starting with a digit.
    pub fn parse(expr: &str) -> Option<Self> {
        let (table_name, key) = expr.split_once('.')?;
        if is_identifier(table_name) && is_identifier(key) {
            Some(Reference::new(table_name, key))
        } else {
            None
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table_name, self.key)
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() || first == b'_' => {
            bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }
        _ => false,
    }
}

/// Outcome of looking up a reference in a known table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a TypedValue),
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a TypedValue> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }
}

/// Named tables available to a resolution run
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<String, Table>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table under its own name, replacing any previous one.
    pub fn insert(&mut self, table: Table) {
        debug!("Registering table '{}'", table.name());
        self.tables.insert(table.name().to_string(), table);
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Resolve a reference.
    ///
    /// An unknown table is fatal; a missing key in a known table is
    /// [`Lookup::NotFound`].
    pub fn lookup(&self, reference: &Reference) -> Result<Lookup<'_>, ManifestError> {
        let table = self
            .tables
            .get(&reference.table_name)
            .ok_or_else(|| ManifestError::UnknownTable(reference.table_name.clone()))?;
        Ok(match table.get(&reference.key) {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TableRegistry {
        let mut registry = TableRegistry::new();
        let table = Table::from_pairs(
            "workspace",
            vec![("sample_id".to_string(), TypedValue::String("S1".to_string()))],
        );
        if let Ok(table) = table {
            registry.insert(table);
        }
        registry
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            Reference::parse("workspace.sample_id"),
            Some(Reference::new("workspace", "sample_id"))
        );
        assert_eq!(
            Reference::parse("_t.k2"),
            Some(Reference::new("_t", "k2"))
        );
        for expr in ["workspace", "a.b.c", "1a.b", "a.", ".b", "a-b.c", "a .b"] {
            assert_eq!(Reference::parse(expr), None, "expr = {expr}");
        }
    }

    #[test]
    fn test_lookup_found_and_missing() {
        let registry = registry();
        let found = registry.lookup(&Reference::new("workspace", "sample_id"));
        assert!(found.is_ok_and(|l| l == Lookup::Found(&TypedValue::String("S1".to_string()))));

        let missing = registry.lookup(&Reference::new("workspace", "missing"));
        assert!(missing.is_ok_and(|l| l == Lookup::NotFound));
    }

    #[test]
    fn test_unknown_table_names_table() {
        let registry = registry();
        let result = registry.lookup(&Reference::new("nope", "key"));
        let Err(err) = result else {
            panic!("unknown table must fail");
        };
        assert!(matches!(&err, ManifestError::UnknownTable(name) if name == "nope"));
        assert!(err.to_string().contains("nope"));
    }
}
