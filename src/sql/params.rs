//! Convert runtime values to types that sqlx can bind.

use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

use crate::value::Value;

/// A value that can be bound to a PostgreSQL query.
#[derive(Clone, Debug)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    Time(chrono::DateTime<chrono::Utc>),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl PgBindValue {
    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Int(i) => PgBindValue::I64(*i),
            Value::Float(f) => PgBindValue::F64(*f),
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Uuid(u) => PgBindValue::Uuid(*u),
            Value::Time(t) => PgBindValue::Time(*t),
            Value::Bytes(b) => PgBindValue::Bytes(b.clone()),
            Value::Json(j) => PgBindValue::Json(j.clone()),
            Value::Array(_) | Value::Record(_) | Value::List(_) => {
                PgBindValue::Json(serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
            }
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf),
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf),
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::String(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
            PgBindValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf),
            PgBindValue::Time(t) => {
                <chrono::DateTime<chrono::Utc> as Encode<Postgres>>::encode_by_ref(t, buf)
            }
            PgBindValue::Bytes(b) => <Vec<u8> as Encode<Postgres>>::encode_by_ref(b, buf),
            PgBindValue::Json(v) => <serde_json::Value as Encode<Postgres>>::encode_by_ref(v, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null => <i32 as Type<Postgres>>::type_info(),
            PgBindValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            PgBindValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            PgBindValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            PgBindValue::String(_) => <String as Type<Postgres>>::type_info(),
            PgBindValue::Uuid(_) => <uuid::Uuid as Type<Postgres>>::type_info(),
            PgBindValue::Time(_) => <chrono::DateTime<chrono::Utc> as Type<Postgres>>::type_info(),
            PgBindValue::Bytes(_) => <Vec<u8> as Type<Postgres>>::type_info(),
            PgBindValue::Json(_) => <serde_json::Value as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}
