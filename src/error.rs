//! Typed errors for configuration, templating, binding, assembly and reads.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },
    #[error("cyclic ref: {0}")]
    CyclicReference(String),
    #[error("view {view}: holder {holder} collides with an existing field")]
    HolderCollision { view: String, holder: String },
    #[error("view {view}: undefined column {column}")]
    ColumnNotFound { view: String, column: String },
    #[error("connector {name}: {reason}")]
    InvalidConnector { name: String, reason: String },
    #[error("view {view}: body parameters disagree on type ({first} vs {second})")]
    BodyTypeMismatch {
        view: String,
        first: String,
        second: String,
    },
    #[error("view {view}: {source}")]
    Template {
        view: String,
        #[source]
        source: TemplateError,
    },
    #[error("view {view}: failed to detect columns: {source}")]
    Probe {
        view: String,
        #[source]
        source: ConnectorError,
    },
    #[error("validation: {0}")]
    Validation(String),
    #[error("load: {0}")]
    Load(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("compile: {message} (at {offset})")]
    Compile { offset: usize, message: String },
    #[error("binding: {0}")]
    Binding(String),
}

impl TemplateError {
    pub(crate) fn compile(offset: usize, message: impl Into<String>) -> Self {
        TemplateError::Compile {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("duplicate field {0}")]
    DuplicateField(String),
}

#[derive(Error, Debug)]
pub enum BindError {
    #[error("parameter {name} is required")]
    Required { name: String },
    #[error("parameter {name}: can't convert {value:?} to {data_type}: {reason}")]
    Conversion {
        name: String,
        value: String,
        data_type: String,
        reason: String,
    },
    #[error("parameter {name}: decode: {reason}")]
    Decode { name: String, reason: String },
    #[error("parameter {name}: incompatible body: {reason}")]
    Body { name: String, reason: String },
    #[error("parameter {name} returns more than one value")]
    Cardinality { name: String },
    #[error("parameter {name} value is required but no data was found")]
    NoData { name: String },
    #[error("selector: {0}")]
    Selector(String),
    #[error("parameter {name}: {source}")]
    Nested {
        name: String,
        #[source]
        source: BindErrors,
    },
    #[error("parameter {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: Box<ReadError>,
    },
    #[error("binding task failed: {0}")]
    Task(String),
}

/// Every binding failure of one request, reported together.
#[derive(Debug, Default)]
pub struct BindErrors(pub Vec<BindError>);

impl BindErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BindError> {
        self.0.iter()
    }
}

impl std::fmt::Display for BindErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to bind parameters")?;
        for err in &self.0 {
            write!(f, "; {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for BindErrors {}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectorError {
    #[error("dest was nil")]
    NilDestination,
    #[error("column {column}: decode: {reason}")]
    Decode { column: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unknown driver: {0}")]
    UnknownDriver(String),
    #[error("column {column} ({type_name}): {source}")]
    Decode {
        column: String,
        type_name: String,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Sink(#[from] CollectorError),
    #[error("connector: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("view {view}: {source}")]
    Connector {
        view: String,
        #[source]
        source: ConnectorError,
    },
    #[error(transparent)]
    Assembly(#[from] CollectorError),
    #[error("view {view}: {source}")]
    Template {
        view: String,
        #[source]
        source: TemplateError,
    },
    #[error("read cancelled")]
    Cancelled,
    #[error("view {view}: prefetched rows are not assignable to the view schema")]
    Incompatible { view: String },
    #[error("cache: {0}")]
    Cache(String),
    #[error("{}", join(.0))]
    Combined(Vec<ReadError>),
}

impl ReadError {
    /// Collapses the errors of one join barrier into a single error.
    pub(crate) fn combine(mut errors: Vec<ReadError>) -> Option<ReadError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ReadError::Combined(errors)),
        }
    }
}

fn join(errors: &[ReadError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bind(#[from] BindErrors),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("encode: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_errors_list_every_failure() {
        let errors = BindErrors(vec![
            BindError::Required {
                name: "user_id".into(),
            },
            BindError::Conversion {
                name: "limit".into(),
                value: "abc".into(),
                data_type: "int".into(),
                reason: "invalid digit found in string".into(),
            },
        ]);
        let text = errors.to_string();
        assert!(text.contains("parameter user_id is required"));
        assert!(text.contains("parameter limit"));
    }

    #[test]
    fn combine_keeps_single_error_unwrapped() {
        let single = ReadError::combine(vec![ReadError::Cancelled]).unwrap();
        assert!(matches!(single, ReadError::Cancelled));

        let many = ReadError::combine(vec![
            ReadError::Cancelled,
            ReadError::Cache("down".into()),
        ])
        .unwrap();
        assert_eq!(many.to_string(), "read cancelled; cache: down");
        assert!(ReadError::combine(Vec::new()).is_none());
    }
}
