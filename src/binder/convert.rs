//! String-to-value conversion for query, path, header and cookie parameters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::value::{DataType, FieldType, Value};

/// Converts `raw` into a value of `ty`. `format` is a chrono pattern for time values.
pub fn convert(raw: &str, ty: &FieldType, format: Option<&str>) -> Result<Value, String> {
    match ty {
        FieldType::Scalar { data_type, .. } => scalar(raw, data_type, format),
        FieldType::One(_) | FieldType::Many(_) => {
            let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
            Value::from_json(&json, ty)
        }
    }
}

fn scalar(raw: &str, data_type: &DataType, format: Option<&str>) -> Result<Value, String> {
    let text = raw.trim();
    match data_type {
        DataType::Bool => match text.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(format!("invalid bool {:?}", raw)),
        },
        DataType::Int => text.parse().map(Value::Int).map_err(|e| format!("{}", e)),
        DataType::Float => text.parse().map(Value::Float).map_err(|e| format!("{}", e)),
        DataType::String => Ok(Value::String(raw.to_string())),
        DataType::Time => time(text, format).map(Value::Time),
        DataType::Uuid => uuid::Uuid::parse_str(text).map(Value::Uuid).map_err(|e| e.to_string()),
        DataType::Json => serde_json::from_str(raw)
            .map(Value::Json)
            .or_else(|_| Ok(Value::Json(serde_json::Value::String(raw.to_string())))),
        DataType::Bytes => Ok(Value::Bytes(raw.as_bytes().to_vec())),
        DataType::Array(inner) => {
            if text.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            text.split(',')
                .map(|item| scalar(item, inner, format))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
    }
}

/// RFC 3339 by default; with a format, a date-time then a bare date pattern.
fn time(text: &str, format: Option<&str>) -> Result<DateTime<Utc>, String> {
    match format {
        Some(format) => NaiveDateTime::parse_from_str(text, format)
            .or_else(|e| {
                NaiveDate::parse_from_str(text, format)
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
                    .map_err(|_| e)
            })
            .map(|t| t.and_utc())
            .map_err(|e| e.to_string()),
        None => DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .or_else(|e| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
                    .map_err(|_| e)
            })
            .map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn converts_scalars() {
        let int = FieldType::scalar(DataType::Int);
        assert_eq!(convert(" 42 ", &int, None), Ok(Value::Int(42)));
        assert!(convert("4x", &int, None).is_err());
        assert_eq!(
            convert("YES", &FieldType::scalar(DataType::Bool), None),
            Ok(Value::Bool(true))
        );
        let ids = FieldType::scalar(DataType::Array(Box::new(DataType::Int)));
        assert_eq!(
            convert("1,2", &ids, None),
            Ok(Value::Array(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn converts_times() {
        let ty = FieldType::scalar(DataType::Time);
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(convert("2024-03-01T00:00:00Z", &ty, None), Ok(Value::Time(expected)));
        assert_eq!(convert("2024-03-01", &ty, None), Ok(Value::Time(expected)));
        assert_eq!(convert("01/03/2024", &ty, Some("%d/%m/%Y")), Ok(Value::Time(expected)));
        assert!(convert("yesterday", &ty, None).is_err());
    }
}
