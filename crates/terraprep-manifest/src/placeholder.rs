//! `${table.key}` placeholders in manifest values
//!
//! A value is tokenized into literal text and placeholders. A placeholder
//! must be the whole value; `$${` is an escape for a literal `${`.

use crate::errors::ManifestError;
use crate::reference::{Lookup, Reference, TableRegistry};
use crate::value::{infer_strict, TypedValue};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Placeholder(String),
}

/// A parsed manifest value
#[derive(Debug, Clone, PartialEq)]
pub enum Placeholder {
    /// `${table.key}`, to be looked up in the table registry
    Reference(Reference),
    /// A literal, or a placeholder whose expression is not a reference
    Value(TypedValue),
}

/// Parse a raw manifest string into a reference or a typed value.
pub fn parse_value(raw: &str) -> Result<Placeholder, ManifestError> {
    let tokens = tokenize(raw)?;
    match tokens.as_slice() {
        [Token::Placeholder(expr)] => parse_expression(expr),
        tokens if tokens.iter().any(|t| matches!(t, Token::Placeholder(_))) => Err(
            ManifestError::parse(raw, "placeholder must span the entire value"),
        ),
        tokens => {
            let text: String = tokens
                .iter()
                .map(|t| match t {
                    Token::Literal(s) | Token::Placeholder(s) => s.as_str(),
                })
                .collect();
            Ok(Placeholder::Value(infer_strict(&text)?))
        }
    }
}

/// Parse and resolve a raw value against the registry.
///
/// `Ok(None)` means the value referenced a key its table does not have.
pub fn resolve_value(
    raw: &str,
    registry: &TableRegistry,
) -> Result<Option<TypedValue>, ManifestError> {
    match parse_value(raw)? {
        Placeholder::Value(value) => Ok(Some(value)),
        Placeholder::Reference(reference) => Ok(match registry.lookup(&reference)? {
            Lookup::Found(value) => Some(value.clone()),
            Lookup::NotFound => None,
        }),
    }
}

fn parse_expression(expr: &str) -> Result<Placeholder, ManifestError> {
    match Reference::parse(expr) {
        Some(reference) => Ok(Placeholder::Reference(reference)),
        None => Ok(Placeholder::Value(infer_strict(expr)?)),
    }
}

fn tokenize(raw: &str) -> Result<Vec<Token>, ManifestError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        literal.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("$${") {
            literal.push_str("${");
            rest = after;
        } else if let Some(after) = tail.strip_prefix("${") {
            let end = after
                .find('}')
                .ok_or_else(|| ManifestError::parse(raw, "unterminated placeholder"))?;
            let expr = &after[..end];
            if expr.contains("${") {
                return Err(ManifestError::parse(raw, "nested placeholders are not supported"));
            }
            let expr = expr.trim();
            if expr.is_empty() {
                return Err(ManifestError::parse(raw, "empty placeholder"));
            }
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Placeholder(expr.to_string()));
            rest = &after[end + 1..];
        } else {
            literal.push('$');
            rest = &tail[1..];
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use crate::value::Primitive;

    fn registry() -> TableRegistry {
        let mut registry = TableRegistry::new();
        if let Ok(table) = Table::from_pairs(
            "workspace",
            vec![
                ("sample_id".to_string(), TypedValue::String("S1".to_string())),
                ("min_qual".to_string(), TypedValue::Integer(20)),
            ],
        ) {
            registry.insert(table);
        }
        registry
    }

    #[test]
    fn test_reference_placeholder() {
        assert!(parse_value("${workspace.sample_id}").is_ok_and(
            |p| p == Placeholder::Reference(Reference::new("workspace", "sample_id"))
        ));
        assert!(parse_value("${ this.bam_or_cram_file }")
            .is_ok_and(|p| p == Placeholder::Reference(Reference::new("this", "bam_or_cram_file"))));
    }

    #[test]
    fn test_non_reference_placeholder_is_inferred() {
        assert!(parse_value("${42}").is_ok_and(|p| p == Placeholder::Value(TypedValue::Integer(42))));
        assert!(parse_value("${a.b.c}")
            .is_ok_and(|p| p == Placeholder::Value(TypedValue::String("a.b.c".to_string()))));
    }

    #[test]
    fn test_literals_are_inferred() {
        assert!(parse_value("3.5").is_ok_and(|p| p == Placeholder::Value(TypedValue::Float(3.5))));
        assert!(parse_value("[1,x]").is_ok_and(|p| p
            == Placeholder::Value(TypedValue::Array(vec![
                Primitive::Integer(1),
                Primitive::String("x".to_string())
            ]))));
        assert!(parse_value("").is_ok_and(|p| p == Placeholder::Value(TypedValue::String(String::new()))));
        assert!(parse_value("cost: $5")
            .is_ok_and(|p| p == Placeholder::Value(TypedValue::String("cost: $5".to_string()))));
    }

    #[test]
    fn test_escape_yields_literal_placeholder_text() {
        assert!(parse_value("$${workspace.x}")
            .is_ok_and(|p| p == Placeholder::Value(TypedValue::String("${workspace.x}".to_string()))));
    }

    #[test]
    fn test_partial_placeholder_is_a_parse_error() {
        for raw in [
            "prefix-${workspace.sample_id}",
            "${workspace.a}${workspace.b}",
            "${workspace.sample_id}.bam",
        ] {
            assert!(
                matches!(parse_value(raw), Err(ManifestError::Parse { .. })),
                "raw = {raw}"
            );
        }
    }

    #[test]
    fn test_malformed_placeholders() {
        for raw in ["${workspace.x", "${}", "${  }", "${a${b}}", "[1,,2]"] {
            assert!(
                matches!(parse_value(raw), Err(ManifestError::Parse { .. })),
                "raw = {raw}"
            );
        }
    }

    #[test]
    fn test_resolve_value() {
        let registry = registry();
        assert!(resolve_value("${workspace.sample_id}", &registry)
            .is_ok_and(|v| v == Some(TypedValue::String("S1".to_string()))));
        assert!(resolve_value("${workspace.min_qual}", &registry)
            .is_ok_and(|v| v == Some(TypedValue::Integer(20))));
        assert!(resolve_value("${workspace.missing}", &registry).is_ok_and(|v| v.is_none()));
        assert!(matches!(
            resolve_value("${nope.key}", &registry),
            Err(ManifestError::UnknownTable(name)) if name == "nope"
        ));
    }
}
