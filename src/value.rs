//! Typed SQL values and the native-type vocabulary of model fields.
//!
//! `SqlValue` is the owned value bound to one `$N` parameter slot; `ValueType`
//! is the reflection layer's view of a field's native type and drives both
//! default SQL-type resolution and row decoding.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use uuid::Uuid;

/// Native type of a model field as reported by the reflection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Timestamp,
    Decimal,
    Uuid,
    Json,
}

impl ValueType {
    /// The zero value used when a non-selected NOT NULL column is auto-filled.
    pub fn zero(self) -> SqlValue {
        match self {
            ValueType::Bool => SqlValue::Bool(false),
            ValueType::Int16 => SqlValue::SmallInt(0),
            ValueType::Int32 => SqlValue::Int(0),
            ValueType::Int64 => SqlValue::BigInt(0),
            ValueType::Float32 => SqlValue::Real(0.0),
            ValueType::Float64 => SqlValue::Double(0.0),
            ValueType::Text => SqlValue::Text(String::new()),
            ValueType::Timestamp => SqlValue::Timestamp(DateTime::UNIX_EPOCH),
            ValueType::Decimal => SqlValue::Decimal(Decimal::ZERO),
            ValueType::Uuid => SqlValue::Uuid(Uuid::nil()),
            ValueType::Json => SqlValue::Json(serde_json::Value::Null),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ValueType::Int16 | ValueType::Int32 | ValueType::Int64)
    }
}

/// One owned value bound to a single statement parameter.
///
/// `Null` carries the field's `ValueType` so the parameter can be bound with
/// the correct type OID (an untyped NULL would fail to plan against non-text
/// columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SqlValue {
    Null(ValueType),
    Bool(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Bind this value to the next parameter slot of `query`.
    pub fn bind<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlValue::Null(ty) => match ty {
                ValueType::Bool => query.bind(None::<bool>),
                ValueType::Int16 => query.bind(None::<i16>),
                ValueType::Int32 => query.bind(None::<i32>),
                ValueType::Int64 => query.bind(None::<i64>),
                ValueType::Float32 => query.bind(None::<f32>),
                ValueType::Float64 => query.bind(None::<f64>),
                ValueType::Text => query.bind(None::<String>),
                ValueType::Timestamp => query.bind(None::<DateTime<Utc>>),
                ValueType::Decimal => query.bind(None::<Decimal>),
                ValueType::Uuid => query.bind(None::<Uuid>),
                ValueType::Json => query.bind(None::<serde_json::Value>),
            },
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::SmallInt(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::BigInt(v) => query.bind(v),
            SqlValue::Real(v) => query.bind(v),
            SqlValue::Double(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
            SqlValue::Decimal(v) => query.bind(v),
            SqlValue::Uuid(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(v),
        }
    }

    /// Decode the column at `index` into the value shape `ty` prescribes.
    ///
    /// SQL NULL decodes to `SqlValue::Null(ty)` for every type.
    pub fn decode(row: &PgRow, index: usize, ty: ValueType) -> Result<SqlValue, sqlx::Error> {
        Ok(match ty {
            ValueType::Bool => row
                .try_get::<Option<bool>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Bool),
            ValueType::Int16 => row
                .try_get::<Option<i16>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::SmallInt),
            ValueType::Int32 => row
                .try_get::<Option<i32>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Int),
            ValueType::Int64 => row
                .try_get::<Option<i64>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::BigInt),
            ValueType::Float32 => row
                .try_get::<Option<f32>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Real),
            ValueType::Float64 => row
                .try_get::<Option<f64>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Double),
            ValueType::Text => row
                .try_get::<Option<String>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Text),
            ValueType::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Timestamp),
            ValueType::Decimal => row
                .try_get::<Option<Decimal>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Decimal),
            ValueType::Uuid => row
                .try_get::<Option<Uuid>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Uuid),
            ValueType::Json => row
                .try_get::<Option<serde_json::Value>, _>(index)?
                .map_or(SqlValue::Null(ty), SqlValue::Json),
        })
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::SmallInt(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}
