//! Query-related data models.
//!
//! This module defines cell values, query parameters and batch statements.

use serde::Serialize;

/// A single cell value, as produced by a query or bound as a parameter.
///
/// Serialization is one-way: bytes are written as base64 strings, which read
/// back indistinguishable from text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(serialize_with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value, used in cell type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Parse a loosely typed literal, as given on the command line.
    ///
    /// `null`, `true`/`false`, integers and floats are recognized; everything
    /// else is text.
    pub fn infer(literal: &str) -> Self {
        if literal.eq_ignore_ascii_case("null") {
            Self::Null
        } else if literal.eq_ignore_ascii_case("true") {
            Self::Bool(true)
        } else if literal.eq_ignore_ascii_case("false") {
            Self::Bool(false)
        } else if let Ok(v) = literal.parse::<i64>() {
            Self::Int(v)
        } else if let Ok(v) = literal.parse::<f64>() {
            Self::Float(v)
        } else {
            Self::Text(literal.to_string())
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Binary data as base64.
fn base64_bytes<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// A query parameter: a value with an optional placeholder name.
///
/// Unnamed parameters bind positionally. Named parameters (`@id`, `:id`, `$id`)
/// bind to the matching placeholder regardless of their order in the slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: Value,
}

impl Param {
    /// Create a named parameter. The name may include its sigil (`@id`) or not (`id`).
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    /// Create a positional parameter.
    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    /// Parameter name without its sigil.
    pub fn bare_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(|n| n.trim_start_matches(['@', ':', '$']))
    }

    /// Parse a `name=value` argument, inferring the value type.
    pub fn parse_assignment(s: &str) -> Result<Self, crate::models::ConfigError> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok(Self::named(name.trim(), Value::infer(value)))
            }
            _ => Err(crate::models::ConfigError::InvalidParam(s.to_string())),
        }
    }
}

/// A non-query statement with its parameters, used for batch execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    /// Create a new statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());
        assert_eq!(Value::Int(42).type_name(), "integer");
        assert_eq!(Value::from("hello").type_name(), "text");
        assert_eq!(Value::from(vec![1u8, 2]).type_name(), "bytes");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_value_infer() {
        assert_eq!(Value::infer("NULL"), Value::Null);
        assert_eq!(Value::infer("true"), Value::Bool(true));
        assert_eq!(Value::infer("42"), Value::Int(42));
        assert_eq!(Value::infer("1.5"), Value::Float(1.5));
        assert_eq!(Value::infer("abc"), Value::Text("abc".to_string()));
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let json = serde_json::to_string(&Value::Bytes(b"hello world".to_vec())).unwrap();
        assert_eq!(json, "\"aGVsbG8gd29ybGQ=\"");
    }

    #[test]
    fn test_param_bare_name() {
        assert_eq!(Param::named("@id", 1).bare_name(), Some("id"));
        assert_eq!(Param::named(":id", 1).bare_name(), Some("id"));
        assert_eq!(Param::named("id", 1).bare_name(), Some("id"));
        assert_eq!(Param::positional(1).bare_name(), None);
    }

    #[test]
    fn test_param_parse_assignment() {
        let param = Param::parse_assignment("@age=42").unwrap();
        assert_eq!(param.bare_name(), Some("age"));
        assert_eq!(param.value, Value::Int(42));

        let param = Param::parse_assignment("name=a=b").unwrap();
        assert_eq!(param.value, Value::Text("a=b".to_string()));

        assert!(Param::parse_assignment("novalue").is_err());
        assert!(Param::parse_assignment("=1").is_err());
    }

    #[test]
    fn test_statement_serializes_blob_params_as_base64() {
        let stmt = Statement::new("INSERT INTO f VALUES (@data)")
            .with_param(Param::named("@data", vec![1u8, 2, 3]))
            .with_param(Param::positional(7));
        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(json["params"][0]["value"], "AQID");
        assert_eq!(json["params"][0]["name"], "@data");
        assert!(json["params"][1].get("name").is_none());
    }

    #[test]
    fn test_statement_builder() {
        let stmt = Statement::new("INSERT INTO t VALUES (?)").with_param(Param::positional(1));
        assert_eq!(stmt.params.len(), 1);
    }
}
