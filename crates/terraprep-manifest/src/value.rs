//! Typed values and string type inference
//!
//! Table cells and manifest literals arrive as untyped strings. [`infer`] turns
//! them into a [`TypedValue`] with a fixed precedence:
//! array, integer, float, boolean, then the original string.

use crate::errors::ManifestError;
use serde::Serialize;
use std::fmt;

/// A scalar that may appear inside an array literal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Primitive {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

/// A resolved, typed manifest or table value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Array(Vec<Primitive>),
}

impl TypedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Integer(_) => "integer",
            TypedValue::Float(_) => "float",
            TypedValue::Boolean(_) => "boolean",
            TypedValue::String(_) => "string",
            TypedValue::Array(_) => "array",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<Primitive> for TypedValue {
    fn from(value: Primitive) -> Self {
        match value {
            Primitive::Integer(i) => TypedValue::Integer(i),
            Primitive::Float(f) => TypedValue::Float(f),
            Primitive::Boolean(b) => TypedValue::Boolean(b),
            Primitive::String(s) => TypedValue::String(s),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Integer(i) => write!(f, "{}", i),
            Primitive::Float(x) => write!(f, "{:?}", x),
            Primitive::Boolean(b) => write!(f, "{}", b),
            Primitive::String(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    match item {
                        Primitive::String(s) => write!(f, "\"{}\"", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str("]")
            }
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Float(x) => write!(f, "{:?}", x),
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::String(s) => f.write_str(s),
        }
    }
}

/// Infer a typed value from a raw string.
///
/// Total: a malformed array literal falls back to the string itself.
pub fn infer(raw: &str) -> TypedValue {
    infer_strict(raw).unwrap_or_else(|_| TypedValue::String(raw.to_string()))
}

/// Infer a typed value, rejecting malformed array literals.
pub fn infer_strict(raw: &str) -> Result<TypedValue, ManifestError> {
    if let Some(body) = array_body(raw) {
        return parse_array(raw, body).map(TypedValue::Array);
    }
    Ok(infer_primitive(raw).into())
}

/// Integer, then float, then boolean, then string.
pub fn infer_primitive(raw: &str) -> Primitive {
    if let Some(i) = parse_integer(raw) {
        Primitive::Integer(i)
    } else if let Some(x) = parse_float(raw) {
        Primitive::Float(x)
    } else if let Some(b) = parse_boolean(raw) {
        Primitive::Boolean(b)
    } else {
        Primitive::String(raw.to_string())
    }
}

fn array_body(raw: &str) -> Option<&str> {
    raw.strip_prefix('[')?.strip_suffix(']')
}

// Only one level of nesting, and commas inside quotes are not escaped.
fn parse_array(raw: &str, body: &str) -> Result<Vec<Primitive>, ManifestError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    body.split(',')
        .map(|element| parse_element(raw, element))
        .collect()
}

fn parse_element(raw: &str, element: &str) -> Result<Primitive, ManifestError> {
    let element = element.trim();
    if element.is_empty() {
        return Err(ManifestError::parse(raw, "empty array element"));
    }
    if element.contains(['[', ']']) {
        return Err(ManifestError::parse(raw, "nested arrays are not supported"));
    }
    // A quoted element is kept verbatim, without inference.
    if let Some(quoted) = element
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return Ok(Primitive::String(quoted.to_string()));
    }
    if element.contains('"') {
        return Err(ManifestError::parse(
            raw,
            format!("unbalanced quote in array element '{}'", element),
        ));
    }
    Ok(infer_primitive(element))
}

fn parse_integer(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

fn parse_float(raw: &str) -> Option<f64> {
    let spelled_as_number = raw.bytes().any(|b| b.is_ascii_digit())
        && raw
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !spelled_as_number {
        return None;
    }
    raw.parse::<f64>().ok().filter(|x| x.is_finite())
}

fn parse_boolean(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
