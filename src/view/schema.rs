//! Record type synthesis from columns and relation holders.

use std::sync::Arc;

use super::Column;
use crate::case::{self, CaseFormat};
use crate::config::{Cardinality, TypeDefinition};
use crate::error::{ConfigError, SchemaError};
use crate::value::{DataType, Field, FieldTag, FieldType, RecordType};

/// A relation as seen by the parent's schema.
pub(crate) struct HolderSpec<'a> {
    pub holder: &'a str,
    pub cardinality: Cardinality,
    pub column: &'a str,
    pub include_column: bool,
    pub child: &'a Arc<RecordType>,
}

/// Builds the record type of a view. Column fields come first in column order,
/// holders follow in relation order. Join columns of One relations are left out
/// unless the relation asks to keep them.
pub(crate) fn synthesize(
    view: &str,
    columns: &[Column],
    holders: &[HolderSpec<'_>],
    format: Option<CaseFormat>,
) -> Result<RecordType, ConfigError> {
    let hidden: Vec<&str> = holders
        .iter()
        .filter(|h| h.cardinality == Cardinality::One && !h.include_column)
        .map(|h| h.column)
        .collect();

    let mut builder = RecordType::builder(case::field_name(view, None));
    let mut names: Vec<String> = Vec::with_capacity(columns.len() + holders.len());
    for column in columns {
        if hidden.iter().any(|h| h.eq_ignore_ascii_case(&column.name)) {
            continue;
        }
        let name = case::field_name(&column.name, format);
        if names.contains(&name) {
            return Err(ConfigError::DuplicateName { kind: "field", name });
        }
        names.push(name.clone());
        builder.push(
            Field::new(name, column.field_type())
                .with_column(&column.name)
                .with_tag(FieldTag {
                    format: column.format.clone(),
                    default: column.default.clone(),
                }),
        );
    }
    for holder in holders {
        if names.iter().any(|n| n == holder.holder) {
            return Err(ConfigError::HolderCollision {
                view: view.to_string(),
                holder: holder.holder.to_string(),
            });
        }
        names.push(holder.holder.to_string());
        let ty = match holder.cardinality {
            Cardinality::One => FieldType::One(Arc::clone(holder.child)),
            Cardinality::Many => FieldType::Many(Arc::clone(holder.child)),
        };
        builder.push(Field::new(holder.holder, ty));
    }
    builder.build().map_err(|SchemaError::DuplicateField(name)| ConfigError::DuplicateName {
        kind: "field",
        name,
    })
}

/// Builds a named type from the resource `types` registry.
pub(crate) fn named_type(def: &TypeDefinition) -> Result<RecordType, ConfigError> {
    let mut builder = RecordType::builder(&def.name);
    for field in &def.fields {
        let data_type = DataType::parse(&field.data_type).ok_or_else(|| {
            ConfigError::Validation(format!(
                "type {}: field {} has unknown data type {}",
                def.name, field.name, field.data_type
            ))
        })?;
        let ty = FieldType::Scalar {
            data_type,
            nullable: field.nullable,
        };
        let column = field.column.clone().unwrap_or_else(|| field.name.clone());
        builder.push(Field::new(&field.name, ty).with_column(column));
    }
    builder.build().map_err(|SchemaError::DuplicateField(name)| ConfigError::DuplicateName {
        kind: "field",
        name,
    })
}
