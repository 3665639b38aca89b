//! PostgreSQL driver on a sqlx pool.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use futures::TryStreamExt;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, PgTypeInfo, PgTypeKind};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::Decimal;
use sqlx::{Column, Executor, Row, TypeInfo};
use std::sync::Arc;
use std::time::Duration;

use super::{ColumnMeta, Connection, Driver, Placeholder, RowSink};
use crate::config::PoolConfig;
use crate::error::ConnectorError;
use crate::sql::PgBindValue;
use crate::value::Value;

pub struct PgDriver;

#[async_trait]
impl Driver for PgDriver {
    fn placeholder(&self) -> Placeholder {
        Placeholder::Dollar
    }

    async fn open(&self, dsn: &str, pool: &PoolConfig) -> Result<Arc<dyn Connection>, ConnectorError> {
        let mut options = PgPoolOptions::new().test_before_acquire(true);
        if let Some(n) = pool.max_connections {
            options = options.max_connections(n);
        }
        if let Some(n) = pool.min_connections {
            options = options.min_connections(n);
        }
        if let Some(ms) = pool.idle_timeout_ms {
            options = options.idle_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = pool.max_lifetime_ms {
            options = options.max_lifetime(Duration::from_millis(ms));
        }
        let pool = options.connect(dsn).await?;
        Ok(Arc::new(PgConnection { pool }))
    }
}

pub struct PgConnection {
    pool: PgPool,
}

impl PgConnection {
    pub fn new(pool: PgPool) -> Self {
        PgConnection { pool }
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn columns(&self, sql: &str, _args: &[Value]) -> Result<Vec<ColumnMeta>, ConnectorError> {
        tracing::debug!(sql = %sql, "describe");
        let described = (&self.pool).describe(sql).await?;
        Ok(described
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| ColumnMeta {
                name: c.name().to_string(),
                type_name: c.type_info().name().to_string(),
                nullable: described.nullable(i),
            })
            .collect())
    }

    async fn query(
        &self,
        sql: &str,
        args: &[Value],
        sink: &mut (dyn RowSink + Send),
    ) -> Result<(), ConnectorError> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = query.bind(PgBindValue::from_value(arg));
        }
        let mut rows = query.fetch(&self.pool);
        while let Some(row) = rows.try_next().await? {
            sink.new_item()?;
            for column in row.columns() {
                *sink.slot(column.name()) = cell_to_value(&row, column.ordinal(), column.type_info())?;
            }
            sink.item_done()?;
        }
        Ok(())
    }
}

fn cell_to_value(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Result<Value, ConnectorError> {
    fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<Option<T>, sqlx::Error>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get::<Option<T>, _>(index)
    }

    let type_name = type_info.name();
    let value = match type_name {
        "INT2" => get::<i16>(row, index).map(|v| v.map(|n| Value::Int(n.into()))),
        "INT4" => get::<i32>(row, index).map(|v| v.map(|n| Value::Int(n.into()))),
        "INT8" => get::<i64>(row, index).map(|v| v.map(Value::Int)),
        "OID" => get::<Oid>(row, index).map(|v| v.map(|n| Value::Int(n.0.into()))),
        "FLOAT4" => get::<f32>(row, index).map(|v| v.map(|n| Value::Float(n.into()))),
        "FLOAT8" => get::<f64>(row, index).map(|v| v.map(Value::Float)),
        "NUMERIC" => get::<Decimal>(row, index).map(|v| v.and_then(|d| decimal_to_float(&d))),
        "MONEY" => get::<PgMoney>(row, index).map(|v| v.map(|m| Value::Float(m.0 as f64 / 100.0))),
        "BOOL" => get::<bool>(row, index).map(|v| v.map(Value::Bool)),
        "UUID" => get::<uuid::Uuid>(row, index).map(|v| v.map(Value::Uuid)),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, index).map(|v| v.map(Value::Time)),
        "TIMESTAMP" => get::<NaiveDateTime>(row, index).map(|v| v.map(|d| Value::Time(d.and_utc()))),
        "DATE" => get::<NaiveDate>(row, index).map(|v| v.map(|d| Value::Time(d.and_time(NaiveTime::MIN).and_utc()))),
        "TIME" => get::<NaiveTime>(row, index).map(|v| v.map(|t| Value::Time(time_of_day(t, 0)))),
        "TIMETZ" => get::<PgTimeTz<NaiveTime, FixedOffset>>(row, index)
            .map(|v| v.map(|t| Value::Time(time_of_day(t.time, t.offset.local_minus_utc())))),
        "INTERVAL" => get::<PgInterval>(row, index).map(|v| v.map(|i| Value::String(interval_text(&i)))),
        "INET" | "CIDR" => get::<IpNetwork>(row, index).map(|v| v.map(|n| Value::String(n.to_string()))),
        "JSON" | "JSONB" => get::<serde_json::Value>(row, index).map(|v| v.map(Value::Json)),
        "BYTEA" => get::<Vec<u8>>(row, index).map(|v| v.map(Value::Bytes)),
        "INT4[]" => get::<Vec<i32>>(row, index)
            .map(|v| v.map(|v| Value::Array(v.into_iter().map(|n| Value::Int(n.into())).collect()))),
        "INT8[]" => get::<Vec<i64>>(row, index)
            .map(|v| v.map(|v| Value::Array(v.into_iter().map(Value::Int).collect()))),
        "TEXT[]" | "VARCHAR[]" => get::<Vec<String>>(row, index)
            .map(|v| v.map(|v| Value::Array(v.into_iter().map(Value::String).collect()))),
        // enum labels travel as text
        _ if matches!(type_info.kind(), PgTypeKind::Enum(_)) => row
            .try_get_unchecked::<Option<String>, _>(index)
            .map(|v| v.map(Value::String)),
        _ => get::<String>(row, index).map(|v| v.map(Value::String)),
    };
    value
        .map(Option::unwrap_or_default)
        .map_err(|source| ConnectorError::Decode {
            column: row.column(index).name().to_string(),
            type_name: type_name.to_string(),
            source,
        })
}

/// NUMERIC as float; the decimal text is kept if it does not parse.
fn decimal_to_float(decimal: &Decimal) -> Option<Value> {
    let text = decimal.to_string();
    Some(match text.parse::<f64>() {
        Ok(n) => Value::Float(n),
        Err(_) => Value::String(text),
    })
}

/// A time of day placed on 1970-01-01 UTC.
fn time_of_day(time: NaiveTime, offset_seconds: i32) -> DateTime<Utc> {
    NaiveDate::default().and_time(time).and_utc() - TimeDelta::seconds(offset_seconds.into())
}

/// ISO 8601 duration, e.g. `P1Y2M3DT4H5M6.5S`.
fn interval_text(interval: &PgInterval) -> String {
    let mut out = String::from("P");
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        out.push_str(&format!("{}Y", years));
    }
    if months != 0 {
        out.push_str(&format!("{}M", months));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }
    let micros = interval.microseconds;
    if micros != 0 {
        let hours = micros / 3_600_000_000;
        let minutes = micros % 3_600_000_000 / 60_000_000;
        let rest = micros % 60_000_000;
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes != 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if rest != 0 {
            let seconds = format!("{:.6}", rest as f64 / 1_000_000.0);
            out.push_str(seconds.trim_end_matches('0').trim_end_matches('.'));
            out.push('S');
        }
    }
    if out.len() == 1 {
        out.push_str("T0S");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(months: i32, days: i32, microseconds: i64) -> PgInterval {
        PgInterval {
            months,
            days,
            microseconds,
        }
    }

    #[test]
    fn intervals_render_as_iso_durations() {
        assert_eq!(interval_text(&interval(14, 3, 0)), "P1Y2M3D");
        assert_eq!(interval_text(&interval(0, 0, 3_723_500_000)), "PT1H2M3.5S");
        assert_eq!(interval_text(&interval(0, 0, 0)), "PT0S");
    }

    #[test]
    fn times_of_day_are_normalized_to_utc() {
        let time = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        assert_eq!(time_of_day(time, 0).to_rfc3339(), "1970-01-01T12:30:00+00:00");
        assert_eq!(time_of_day(time, 3600).to_rfc3339(), "1970-01-01T11:30:00+00:00");
    }

    #[test]
    fn numerics_become_floats() {
        let price: Decimal = "12.25".parse().unwrap();
        assert_eq!(decimal_to_float(&price), Some(Value::Float(12.25)));
        let negative: Decimal = "-0.5".parse().unwrap();
        assert_eq!(decimal_to_float(&negative), Some(Value::Float(-0.5)));
    }

    #[test]
    fn decode_failures_name_the_column() {
        let err = ConnectorError::Decode {
            column: "price".into(),
            type_name: "NUMERIC".into(),
            source: sqlx::Error::ColumnNotFound("price".into()),
        };
        assert!(err.to_string().starts_with("column price (NUMERIC):"), "{}", err);
    }
}
