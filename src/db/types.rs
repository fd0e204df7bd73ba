//! Driver value decoding.
//!
//! This module maps driver rows onto the crate's [`Value`] model.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies a type name into a logical category
//! 2. Backend-specific decoders handle the actual value extraction
//!
//! SQLite is dynamically typed, so its decoder classifies the runtime storage
//! class of each value. MySQL is classified by the declared column type.

use crate::models::{Column as ColumnInfo, DatabaseType, Row as ValueRow, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    if lower == "date" || lower == "time" || lower.contains("datetime") || lower == "timestamp" {
        return TypeCategory::Temporal;
    }

    if lower.contains("char") || lower.contains("text") || lower.contains("enum") {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row Conversion Trait
// =============================================================================

/// Trait for converting driver rows into [`ValueRow`]s.
pub trait RowToValues {
    fn to_values(&self) -> ValueRow;
    fn column_info(&self) -> Vec<ColumnInfo>;
}

impl RowToValues for SqliteRow {
    fn to_values(&self) -> ValueRow {
        ValueRow(
            (0..self.columns().len())
                .map(|idx| sqlite::decode_column(self, idx))
                .collect(),
        )
    }

    fn column_info(&self) -> Vec<ColumnInfo> {
        self.columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect()
    }
}

impl RowToValues for MySqlRow {
    fn to_values(&self) -> ValueRow {
        ValueRow(
            self.columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| {
                    let type_name = col.type_info().name();
                    let category = categorize_type(type_name, DatabaseType::MySQL);
                    mysql::decode_column(self, idx, category)
                })
                .collect(),
        )
    }

    fn column_info(&self) -> Vec<ColumnInfo> {
        self.columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect()
    }
}

// =============================================================================
// Backend-Specific Decoders
// =============================================================================

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize) -> Value {
        // Storage class of this particular value, not the declared column type
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(raw) => raw.type_info().name().to_string(),
            Err(e) => {
                tracing::warn!(column = idx, error = %e, "Failed to read SQLite value");
                return Value::Null;
            }
        };

        let decoded = match categorize_type(&storage, DatabaseType::SQLite) {
            TypeCategory::Integer | TypeCategory::Boolean => decode_integer(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            _ => decode_text(row, idx),
        };

        decoded
            .or_else(|| decode_text(row, idx))
            .or_else(|| decode_integer(row, idx))
            .or_else(|| decode_float(row, idx))
            .or_else(|| decode_binary(row, idx))
            .unwrap_or_else(|| {
                tracing::warn!(column = idx, storage = %storage, "Unsupported SQLite value");
                Value::Null
            })
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> Option<Value> {
        row.try_get::<i64, _>(idx).ok().map(Value::Int)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> Option<Value> {
        row.try_get::<f64, _>(idx).ok().map(Value::Float)
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> Option<Value> {
        row.try_get::<Vec<u8>, _>(idx).ok().map(Value::Bytes)
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> Option<Value> {
        row.try_get::<String, _>(idx).ok().map(Value::Text)
    }
}

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> Value {
        match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(column = idx, error = %e, "Failed to read MySQL value");
                return Value::Null;
            }
        }

        let decoded = match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Text | TypeCategory::Unknown => None,
        };

        decoded
            .or_else(|| decode_text(row, idx))
            .or_else(|| decode_integer(row, idx))
            .or_else(|| decode_float(row, idx))
            .or_else(|| decode_binary(row, idx))
            .unwrap_or_else(|| {
                tracing::warn!(column = idx, "Unsupported MySQL value");
                Value::Null
            })
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Option<Value> {
        match row.try_get::<RawDecimal, _>(idx) {
            Ok(v) => Some(Value::Text(v.0)),
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                None
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<Value> {
        // Try signed types
        if let Ok(v) = row.try_get::<i8, _>(idx) {
            return Some(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Some(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(Value::Int(v));
        }
        // Try unsigned types
        if let Ok(v) = row.try_get::<u8, _>(idx) {
            return Some(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u16, _>(idx) {
            return Some(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u32, _>(idx) {
            return Some(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            // BIGINT UNSIGNED past i64::MAX keeps its exact digits as text
            return Some(match i64::try_from(v) {
                Ok(v) => Value::Int(v),
                Err(_) => Value::Text(v.to_string()),
            });
        }
        None
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Option<Value> {
        row.try_get::<bool, _>(idx).ok().map(Value::Bool)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Option<Value> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(Value::Float(v));
        }
        row.try_get::<f32, _>(idx)
            .ok()
            .map(|v| Value::Float(v as f64))
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> Option<Value> {
        row.try_get::<Vec<u8>, _>(idx).ok().map(Value::Bytes)
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Option<Value> {
        row.try_get::<serde_json::Value, _>(idx)
            .ok()
            .map(|v| Value::Text(v.to_string()))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Option<Value> {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(Value::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()));
        }
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Some(Value::Text(v.to_rfc3339()));
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Some(Value::Text(v.to_string()));
        }
        row.try_get::<NaiveTime, _>(idx)
            .ok()
            .map(|v| Value::Text(v.to_string()))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Option<Value> {
        row.try_get::<String, _>(idx).ok().map(Value::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT UNSIGNED", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DatabaseType::SQLite),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_storage_classes() {
        assert_eq!(
            categorize_type("REAL", DatabaseType::SQLite),
            TypeCategory::Float
        );
        assert_eq!(
            categorize_type("BLOB", DatabaseType::SQLite),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("TEXT", DatabaseType::SQLite),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_categorize_type_mysql_specific() {
        assert_eq!(
            categorize_type("BOOLEAN", DatabaseType::MySQL),
            TypeCategory::Boolean
        );
        assert_eq!(
            categorize_type("VARBINARY", DatabaseType::MySQL),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            TypeCategory::Temporal
        );
        assert_eq!(
            categorize_type("JSON", DatabaseType::MySQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
    }
}
