//! Named value transformers applied to parameters and result columns.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::value::{DataType, Value};

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Where a codec is being applied.
#[derive(Clone, Copy, Debug)]
pub struct CodecContext<'a> {
    pub view: &'a str,
    /// Parameter or column name.
    pub name: &'a str,
}

pub trait Codec: Send + Sync {
    /// Type of the decoded value; replaces the declared type of a column it is attached to.
    fn output_type(&self) -> DataType;

    fn decode(&self, ctx: &CodecContext<'_>, raw: &Value) -> Result<Value, CodecError>;
}

/// A codec resolved from the registry, remembered with its name.
#[derive(Clone)]
pub struct CodecRef {
    name: String,
    codec: Arc<dyn Codec>,
}

impl CodecRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_type(&self) -> DataType {
        self.codec.output_type()
    }

    pub fn decode(&self, ctx: &CodecContext<'_>, raw: &Value) -> Result<Value, CodecError> {
        self.codec.decode(ctx, raw)
    }
}

impl fmt::Debug for CodecRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodecRef({})", self.name)
    }
}

#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// Registry with the built-in codecs: `json`, `csv`.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register("json", Arc::new(JsonCodec));
        registry.register("csv", Arc::new(CsvCodec));
        registry
    }

    pub fn register(&mut self, name: &str, codec: Arc<dyn Codec>) {
        self.codecs.insert(name.to_string(), codec);
    }

    pub fn lookup(&self, name: &str) -> Option<CodecRef> {
        self.codecs.get(name).map(|codec| CodecRef {
            name: name.to_string(),
            codec: Arc::clone(codec),
        })
    }
}

/// Parses text into a JSON document.
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn output_type(&self) -> DataType {
        DataType::Json
    }

    fn decode(&self, ctx: &CodecContext<'_>, raw: &Value) -> Result<Value, CodecError> {
        match raw {
            Value::Null => Ok(Value::Null),
            Value::String(s) => serde_json::from_str(s)
                .map(Value::Json)
                .map_err(|e| CodecError(format!("{}: {}", ctx.name, e))),
            Value::Bytes(b) => serde_json::from_slice(b)
                .map(Value::Json)
                .map_err(|e| CodecError(format!("{}: {}", ctx.name, e))),
            Value::Json(j) => Ok(Value::Json(j.clone())),
            other => serde_json::to_value(other)
                .map(Value::Json)
                .map_err(|e| CodecError(e.to_string())),
        }
    }
}

/// Splits comma separated text into a string array.
pub struct CsvCodec;

impl Codec for CsvCodec {
    fn output_type(&self) -> DataType {
        DataType::Array(Box::new(DataType::String))
    }

    fn decode(&self, ctx: &CodecContext<'_>, raw: &Value) -> Result<Value, CodecError> {
        match raw {
            Value::Null => Ok(Value::Array(Vec::new())),
            Value::String(s) => Ok(Value::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
            )),
            other => Err(CodecError(format!(
                "{}: csv expects text, got {}",
                ctx.name,
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: CodecContext<'static> = CodecContext {
        view: "orders",
        name: "tags",
    };

    #[test]
    fn builtin_codecs_decode_text() {
        let registry = CodecRegistry::new();
        let csv = registry.lookup("csv").unwrap();
        assert_eq!(
            csv.decode(&CTX, &Value::from("a, b,,c")).unwrap(),
            Value::Array(vec!["a".into(), "b".into(), "c".into()])
        );
        let json = registry.lookup("json").unwrap();
        assert_eq!(
            json.decode(&CTX, &Value::from("{\"x\":1}")).unwrap(),
            Value::Json(serde_json::json!({"x": 1}))
        );
        assert!(json.decode(&CTX, &Value::from("{")).is_err());
        assert!(registry.lookup("missing").is_none());
    }
}
