//! Runtime values, record types and records.
//!
//! Views produce rows whose shape is only known once the configuration is
//! loaded, so a row is a [`Record`]: an ordered list of [`Value`]s typed by a
//! shared [`RecordType`]. Record types compare structurally, which is what
//! "assignable" means for prefetched rows and template bindings.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
    Time,
    Uuid,
    Json,
    Bytes,
    Array(Box<DataType>),
}

impl DataType {
    /// Maps a database or configuration type name ("INT8", "varchar(20)",
    /// "[]int", "TEXT[]") to a data type. Returns `None` when the name is not
    /// recognised.
    pub fn parse(name: &str) -> Option<DataType> {
        let name = name.trim();
        if let Some(inner) = name.strip_prefix("[]") {
            return DataType::parse(inner).map(|t| DataType::Array(Box::new(t)));
        }
        if let Some(inner) = name.strip_suffix("[]") {
            return DataType::parse(inner).map(|t| DataType::Array(Box::new(t)));
        }
        if let Some(inner) = name.strip_prefix('_') {
            // postgres internal array names: _int4, _text
            return DataType::parse(inner).map(|t| DataType::Array(Box::new(t)));
        }
        let lower = name.to_ascii_lowercase();
        let base = lower
            .split('(')
            .next()
            .unwrap_or_default()
            .trim_end_matches(" unsigned")
            .trim();
        let parsed = match base {
            "bool" | "boolean" => DataType::Bool,
            "int" | "integer" | "int2" | "int4" | "int8" | "int16" | "int32" | "int64" | "uint"
            | "uint8" | "uint16" | "uint32" | "uint64" | "smallint" | "bigint" | "tinyint"
            | "mediumint" | "serial" | "smallserial" | "bigserial" | "oid" => DataType::Int,
            "float" | "float4" | "float8" | "float32" | "float64" | "double" | "double precision"
            | "real" | "numeric" | "decimal" | "money" => DataType::Float,
            "text" | "varchar" | "char" | "character" | "character varying" | "string" | "name"
            | "bpchar" | "citext" | "enum" | "inet" | "interval" => DataType::String,
            "timestamp" | "timestamptz" | "timestamp with time zone"
            | "timestamp without time zone" | "date" | "datetime" | "time" | "timetz"
            | "time.time" => DataType::Time,
            "uuid" => DataType::Uuid,
            "json" | "jsonb" => DataType::Json,
            "bytea" | "blob" | "binary" | "varbinary" | "bytes" => DataType::Bytes,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn zero(&self) -> Value {
        match self {
            DataType::Bool => Value::Bool(false),
            DataType::Int => Value::Int(0),
            DataType::Float => Value::Float(0.0),
            DataType::String => Value::String(String::new()),
            DataType::Array(_) => Value::Array(Vec::new()),
            DataType::Time | DataType::Uuid | DataType::Json | DataType::Bytes => Value::Null,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => f.write_str("bool"),
            DataType::Int => f.write_str("int"),
            DataType::Float => f.write_str("float"),
            DataType::String => f.write_str("string"),
            DataType::Time => f.write_str("time"),
            DataType::Uuid => f.write_str("uuid"),
            DataType::Json => f.write_str("json"),
            DataType::Bytes => f.write_str("bytes"),
            DataType::Array(inner) => write!(f, "[]{}", inner),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    Scalar { data_type: DataType, nullable: bool },
    One(Arc<RecordType>),
    Many(Arc<RecordType>),
}

impl FieldType {
    pub fn scalar(data_type: DataType) -> Self {
        FieldType::Scalar {
            data_type,
            nullable: false,
        }
    }

    pub fn nullable(data_type: DataType) -> Self {
        FieldType::Scalar {
            data_type,
            nullable: true,
        }
    }

    /// The value a fresh record carries for this field.
    pub fn zero(&self) -> Value {
        match self {
            FieldType::Scalar {
                nullable: true, ..
            } => Value::Null,
            FieldType::Scalar { data_type, .. } => data_type.zero(),
            FieldType::One(_) => Value::Null,
            FieldType::Many(_) => Value::List(Vec::new()),
        }
    }

    /// Whether `value` can be stored in a field of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::Scalar { data_type, .. }, v) => data_type_accepts(data_type, v),
            (FieldType::One(t), Value::Record(r)) => **t == **r.record_type(),
            (FieldType::Many(t), Value::List(items)) => {
                items.iter().all(|r| **t == **r.record_type())
            }
            _ => false,
        }
    }
}

fn data_type_accepts(data_type: &DataType, value: &Value) -> bool {
    match (data_type, value) {
        (DataType::Json, _) => true,
        (DataType::Bool, Value::Bool(_))
        | (DataType::Int, Value::Int(_))
        | (DataType::Float, Value::Float(_) | Value::Int(_))
        | (DataType::String, Value::String(_))
        | (DataType::Time, Value::Time(_))
        | (DataType::Uuid, Value::Uuid(_))
        | (DataType::Bytes, Value::Bytes(_)) => true,
        (DataType::Array(inner), Value::Array(items)) => {
            items.iter().all(|v| data_type_accepts(inner, v))
        }
        _ => false,
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar {
                data_type,
                nullable: true,
            } => write!(f, "*{}", data_type),
            FieldType::Scalar { data_type, .. } => write!(f, "{}", data_type),
            FieldType::One(t) => write!(f, "*{}", t.name()),
            FieldType::Many(t) => write!(f, "[]{}", t.name()),
        }
    }
}

/// Per-field metadata carried from column configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldTag {
    pub format: Option<String>,
    pub default: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    /// Source column; `None` for relation holders and template parameters.
    pub column: Option<String>,
    pub ty: FieldType,
    pub tag: FieldTag,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Field {
            name: name.into(),
            column: None,
            ty,
            tag: FieldTag::default(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_tag(mut self, tag: FieldTag) -> Self {
        self.tag = tag;
        self
    }
}

#[derive(Debug)]
pub struct RecordType {
    name: String,
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl RecordType {
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Field position for a result column. Falls back to a case-insensitive match.
    pub fn index_of_column(&self, column: &str) -> Option<usize> {
        self.by_column
            .get(column)
            .or_else(|| self.by_column.get(&column.to_lowercase()))
            .copied()
    }

    pub fn new_record(self: &Arc<Self>) -> Record {
        Record::new(Arc::clone(self))
    }
}

pub struct RecordTypeBuilder {
    name: String,
    fields: Vec<Field>,
}

impl RecordTypeBuilder {
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn build(self) -> Result<RecordType, SchemaError> {
        let mut by_name = HashMap::with_capacity(self.fields.len());
        let mut by_column = HashMap::new();
        for (index, field) in self.fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), index).is_some() {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
            if let Some(column) = &field.column {
                by_column.entry(column.clone()).or_insert(index);
                by_column.entry(column.to_lowercase()).or_insert(index);
            }
        }
        Ok(RecordType {
            name: self.name,
            fields: self.fields,
            by_name,
            by_column,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    ty: Arc<RecordType>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(ty: Arc<RecordType>) -> Self {
        let values = ty.fields.iter().map(|f| f.ty.zero()).collect();
        Record { ty, values }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty.index_of(name).map(|i| &self.values[i])
    }

    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn column(&self, column: &str) -> Option<&Value> {
        self.ty.index_of_column(column).map(|i| &self.values[i])
    }

    /// Sets a field by name; returns false when the record has no such field.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.ty.index_of(name) {
            Some(index) => {
                self.values[index] = value;
                true
            }
            None => false,
        }
    }

    pub fn set_at(&mut self, index: usize, value: Value) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn slot_at(&mut self, index: usize) -> Option<&mut Value> {
        self.values.get_mut(index)
    }

    pub fn column_slot(&mut self, column: &str) -> Option<&mut Value> {
        let index = self.ty.index_of_column(column)?;
        self.values.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.ty.fields.iter().zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(&field.name, value)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    Uuid(uuid::Uuid),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Array(Vec<Value>),
    Record(Record),
    List(Vec<Record>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Record]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Template truthiness: null, false, zero and empty collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Json(serde_json::Value::Null) => false,
            Value::Time(_) | Value::Uuid(_) | Value::Json(_) | Value::Record(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Time(_) => "time",
            Value::Uuid(_) => "uuid",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::List(_) => "list",
        }
    }

    /// Converts a JSON document into a value of the given field type.
    pub fn from_json(json: &serde_json::Value, ty: &FieldType) -> Result<Value, String> {
        use serde_json::Value as J;
        match (ty, json) {
            (_, J::Null) => Ok(Value::Null),
            (FieldType::Scalar { data_type, .. }, json) => scalar_from_json(json, data_type),
            (FieldType::One(t), J::Object(_)) => record_from_json(json, t).map(Value::Record),
            (FieldType::Many(t), J::Array(items)) => items
                .iter()
                .map(|item| record_from_json(item, t))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (FieldType::Many(t), J::Object(_)) => {
                record_from_json(json, t).map(|r| Value::List(vec![r]))
            }
            (ty, json) => Err(format!("expected {}, got {}", ty, json_kind(json))),
        }
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn scalar_from_json(json: &serde_json::Value, data_type: &DataType) -> Result<Value, String> {
    use serde_json::Value as J;
    let mismatch = || format!("expected {}, got {}", data_type, json_kind(json));
    match (data_type, json) {
        (DataType::Json, json) => Ok(Value::Json(json.clone())),
        (DataType::Bool, J::Bool(b)) => Ok(Value::Bool(*b)),
        (DataType::Int, J::Number(n)) => n.as_i64().map(Value::Int).ok_or_else(mismatch),
        (DataType::Float, J::Number(n)) => n.as_f64().map(Value::Float).ok_or_else(mismatch),
        (DataType::String, J::String(s)) => Ok(Value::String(s.clone())),
        (DataType::Time, J::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| Value::Time(t.with_timezone(&Utc)))
            .map_err(|e| e.to_string()),
        (DataType::Uuid, J::String(s)) => uuid::Uuid::parse_str(s)
            .map(Value::Uuid)
            .map_err(|e| e.to_string()),
        (DataType::Bytes, J::String(s)) => Ok(Value::Bytes(s.as_bytes().to_vec())),
        (DataType::Array(inner), J::Array(items)) => items
            .iter()
            .map(|item| scalar_from_json(item, inner))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Err(mismatch()),
    }
}

fn record_from_json(json: &serde_json::Value, ty: &Arc<RecordType>) -> Result<Record, String> {
    let object = json
        .as_object()
        .ok_or_else(|| format!("expected object for {}, got {}", ty.name(), json_kind(json)))?;
    let mut record = ty.new_record();
    for (index, field) in ty.fields().iter().enumerate() {
        let key = field.column.as_deref().unwrap_or(&field.name);
        let found = object
            .get(&field.name)
            .or_else(|| object.get(key))
            .or_else(|| {
                object
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&field.name) || k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            });
        if let Some(value) = found {
            let value = Value::from_json(value, &field.ty)
                .map_err(|e| format!("{}.{}: {}", ty.name(), field.name, e))?;
            record.set_at(index, value);
        }
    }
    Ok(record)
}

/// Renders a value as template text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Json(j) => write!(f, "{}", j),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Record(_) | Value::List(_) => match serde_json::to_string(self) {
                Ok(text) => f.write_str(&text),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Time(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Uuid(u) => serializer.serialize_str(&u.to_string()),
            Value::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            Value::Json(j) => j.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Record(r) => r.serialize(serializer),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Hashable form of a join value. Null and composite values are not keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Float(u64),
    String(String),
    Time(DateTime<Utc>),
    Uuid(uuid::Uuid),
}

impl Key {
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Int(i) => Some(Key::Int(*i)),
            // integral floats join with integer columns
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some(Key::Int(*f as i64))
            }
            Value::Float(f) => Some(Key::Float(f.to_bits())),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Time(t) => Some(Key::Time(*t)),
            Value::Uuid(u) => Some(Key::Uuid(*u)),
            Value::Json(serde_json::Value::Number(n)) => n.as_i64().map(Key::Int),
            Value::Json(serde_json::Value::String(s)) => Some(Key::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Float(bits) => Value::Float(f64::from_bits(*bits)),
            Key::String(s) => Value::String(s.clone()),
            Key::Time(t) => Value::Time(*t),
            Key::Uuid(u) => Value::Uuid(*u),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line_item_type() -> Arc<RecordType> {
        Arc::new(
            RecordType::builder("LineItem")
                .field(Field::new("Id", FieldType::scalar(DataType::Int)).with_column("id"))
                .field(Field::new("Sku", FieldType::nullable(DataType::String)).with_column("sku"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn parses_database_type_names() {
        assert_eq!(DataType::parse("INT8"), Some(DataType::Int));
        assert_eq!(DataType::parse("varchar(20)"), Some(DataType::String));
        assert_eq!(DataType::parse("TIMESTAMPTZ"), Some(DataType::Time));
        assert_eq!(
            DataType::parse("TEXT[]"),
            Some(DataType::Array(Box::new(DataType::String)))
        );
        assert_eq!(
            DataType::parse("[]int"),
            Some(DataType::Array(Box::new(DataType::Int)))
        );
        assert_eq!(DataType::parse("geometry"), None);
    }

    #[test]
    fn builder_rejects_duplicate_fields() {
        let err = RecordType::builder("T")
            .field(Field::new("Id", FieldType::scalar(DataType::Int)))
            .field(Field::new("Id", FieldType::scalar(DataType::String)))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("Id".into()));
    }

    #[test]
    fn new_record_holds_zero_values() {
        let child = line_item_type();
        let ty = Arc::new(
            RecordType::builder("Order")
                .field(Field::new("Id", FieldType::scalar(DataType::Int)).with_column("id"))
                .field(Field::new("Items", FieldType::Many(child.clone())))
                .field(Field::new("First", FieldType::One(child)))
                .build()
                .unwrap(),
        );
        let record = ty.new_record();
        assert_eq!(record.get("Id"), Some(&Value::Int(0)));
        assert_eq!(record.get("Items"), Some(&Value::List(Vec::new())));
        assert_eq!(record.get("First"), Some(&Value::Null));
        assert_eq!(record.column("ID"), Some(&Value::Int(0)));
    }

    #[test]
    fn record_types_compare_structurally() {
        assert_eq!(*line_item_type(), *line_item_type());
        let other = RecordType::builder("LineItem")
            .field(Field::new("Id", FieldType::scalar(DataType::String)).with_column("id"))
            .build()
            .unwrap();
        assert_ne!(*line_item_type(), other);
    }

    #[test]
    fn converts_json_into_records() {
        let ty = line_item_type();
        let value = Value::from_json(
            &json!([{"id": 1, "sku": "A"}, {"Id": 2}]),
            &FieldType::Many(ty.clone()),
        )
        .unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("Sku"), Some(&Value::String("A".into())));
        assert_eq!(items[1].get("Id"), Some(&Value::Int(2)));
        assert_eq!(items[1].get("Sku"), Some(&Value::Null));

        let err = Value::from_json(&json!({"id": "x"}), &FieldType::One(ty)).unwrap_err();
        assert!(err.contains("LineItem.Id"));
    }

    #[test]
    fn serializes_records_by_field_name() {
        let mut record = line_item_type().new_record();
        record.set("Id", Value::Int(7));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"Id": 7, "Sku": null}));
    }

    #[test]
    fn keys_ignore_null_and_unify_integral_floats() {
        assert_eq!(Key::from_value(&Value::Null), None);
        assert_eq!(Key::from_value(&Value::Float(3.0)), Some(Key::Int(3)));
        assert_eq!(
            Key::from_value(&Value::String("a".into())).map(|k| k.to_value()),
            Some(Value::String("a".into()))
        );
    }
}
