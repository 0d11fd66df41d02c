//! Typed properties and source-type mapping.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::datasource::SqlValue;

/// Target property types of the graph model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Date,
    DateTime,
    Binary,
}

/// Raised when a row value cannot be represented as the target type.
/// Recoverable: the engine logs and skips the row.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot coerce `{value}` into {target:?}")]
pub struct CoercionError {
    pub value: String,
    pub target: PropertyType,
}

impl PropertyType {
    /// Maps a declared SQL type name to a property type. Precision
    /// suffixes (`DECIMAL(10,2)`) and vendor casing are tolerated; unknown
    /// types fall back to `String`.
    pub fn from_sql_type(declared: &str) -> PropertyType {
        let base = declared
            .split(['(', ' '])
            .next()
            .unwrap_or(declared)
            .to_ascii_uppercase();
        match base.as_str() {
            "BOOLEAN" | "BOOL" | "BIT" => PropertyType::Boolean,
            "SMALLINT" | "TINYINT" | "INT" | "INTEGER" | "MEDIUMINT" | "INT2" | "INT4"
            | "SERIAL" => PropertyType::Integer,
            "BIGINT" | "INT8" | "BIGSERIAL" => PropertyType::Long,
            "REAL" | "FLOAT4" => PropertyType::Float,
            "FLOAT" | "DOUBLE" | "FLOAT8" => PropertyType::Double,
            "DECIMAL" | "NUMERIC" | "NUMBER" | "MONEY" => PropertyType::Decimal,
            "DATE" => PropertyType::Date,
            "TIMESTAMP" | "DATETIME" | "TIMESTAMPTZ" => PropertyType::DateTime,
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" | "LONGBLOB" => PropertyType::Binary,
            _ => PropertyType::String,
        }
    }

    /// Coerces a row value into this type. `Null` passes through; whether
    /// a null is acceptable is the caller's decision.
    pub fn coerce(&self, value: &SqlValue) -> Result<SqlValue, CoercionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let fail = || CoercionError {
            value: value.to_string(),
            target: *self,
        };
        match self {
            PropertyType::String | PropertyType::Binary => Ok(match value {
                Value::String(_) => value.clone(),
                other => Value::String(scalar_to_string(other).ok_or_else(fail)?),
            }),
            PropertyType::Integer | PropertyType::Long => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| fail()),
                _ => Err(fail()),
            },
            PropertyType::Float | PropertyType::Double | PropertyType::Decimal => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|_| fail()),
                _ => Err(fail()),
            },
            PropertyType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
                Value::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "t" | "1" | "y" => Ok(Value::Bool(true)),
                    "false" | "f" | "0" | "n" => Ok(Value::Bool(false)),
                    _ => Err(fail()),
                },
                _ => Err(fail()),
            },
            PropertyType::Date => match value {
                Value::String(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => {
                    Ok(value.clone())
                }
                _ => Err(fail()),
            },
            PropertyType::DateTime => match value {
                Value::String(s)
                    if NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
                        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok() =>
                {
                    Ok(value.clone())
                }
                _ => Err(fail()),
            },
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One property of a vertex or edge type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProperty {
    pub name: String,
    pub ordinal_position: usize,
    /// Source column this property was mapped from.
    pub source_column: String,
    /// Declared source type, kept for diagnostics.
    pub source_type: String,
    pub property_type: PropertyType,
    pub is_from_primary_key: bool,
    pub mandatory: bool,
    pub read_only: bool,
    pub not_null: bool,
}
