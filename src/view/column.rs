use std::collections::HashMap;

use crate::case;
use crate::codec::CodecRef;
use crate::config::ColumnConfig;
use crate::connector::ColumnMeta;
use crate::value::{DataType, FieldType};

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    /// Type name as declared or reported by the driver.
    pub type_name: String,
    /// `None` when the type name is not recognised.
    pub data_type: Option<DataType>,
    pub nullable: bool,
    pub filterable: bool,
    pub codec: Option<CodecRef>,
    pub format: Option<String>,
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        let type_name = type_name.into();
        Column {
            name: name.into(),
            data_type: DataType::parse(&type_name),
            type_name,
            nullable,
            filterable: false,
            codec: None,
            format: None,
            default: None,
        }
    }

    pub(crate) fn from_meta(meta: ColumnMeta) -> Self {
        Column::new(meta.name, meta.type_name, meta.nullable != Some(false))
    }

    /// Field type of the column in a synthesized record: the codec output type
    /// wins over the declared type; unknown types are carried as JSON.
    pub fn field_type(&self) -> FieldType {
        let data_type = match &self.codec {
            Some(codec) => codec.output_type(),
            None => self.data_type.clone().unwrap_or(DataType::Json),
        };
        FieldType::Scalar {
            data_type,
            nullable: self.nullable,
        }
    }

    pub(crate) fn to_config(&self) -> ColumnConfig {
        ColumnConfig {
            name: self.name.clone(),
            data_type: Some(self.type_name.clone()).filter(|t| !t.is_empty()),
            nullable: Some(self.nullable),
            codec: self.codec.as_ref().map(|c| c.name().to_string()),
            format: self.format.clone(),
            default: self.default.clone(),
        }
    }
}

/// Case-insensitive column lookup. Lookup tries the name as given, then upper, then lower case.
#[derive(Clone, Debug, Default)]
pub struct Columns {
    by_key: HashMap<String, usize>,
}

impl Columns {
    pub fn index(columns: &[Column]) -> Self {
        let mut by_key = HashMap::new();
        for (position, column) in columns.iter().enumerate() {
            for key in case::lookup_keys(&column.name) {
                by_key.entry(key).or_insert(position);
            }
        }
        Columns { by_key }
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.by_key
            .get(name)
            .or_else(|| self.by_key.get(&name.to_uppercase()))
            .or_else(|| self.by_key.get(&name.to_lowercase()))
            .copied()
    }
}
