//! Dynamically typed column values.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use smol_str::SmolStr;
use uuid::Uuid;

use crate::error::{QueryError, QueryResult};

/// A column value as it travels between the executor and entities.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Any integer column.
    Int(i64),
    /// Any floating-point column.
    Float(f64),
    /// Text, including enum labels and unmapped types.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// UUID.
    Uuid(Uuid),
    /// Timestamp, normalized to UTC.
    Timestamp(DateTime<Utc>),
    /// Calendar date.
    Date(NaiveDate),
    /// JSON document.
    Json(serde_json::Value),
    /// One-dimensional array.
    Array(Vec<Value>),
}

impl Value {
    /// Check for NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type label for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Json(_) => "json",
            Self::Array(_) => "array",
        }
    }

    /// The hashable form of a key value. `None` for NULL and for values that
    /// cannot identify a row (floats, JSON, arrays).
    pub fn to_key(&self) -> Option<KeyValue> {
        Some(match self {
            Self::Bool(v) => KeyValue::Bool(*v),
            Self::Int(v) => KeyValue::Int(*v),
            Self::Text(v) => KeyValue::Text(SmolStr::new(v)),
            Self::Bytes(v) => KeyValue::Bytes(v.clone()),
            Self::Uuid(v) => KeyValue::Uuid(*v),
            Self::Timestamp(v) => KeyValue::Timestamp(*v),
            Self::Date(v) => KeyValue::Date(*v),
            Self::Null | Self::Float(_) | Self::Json(_) | Self::Array(_) => return None,
        })
    }
}

/// A value usable as (part of) a row identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Text.
    Text(SmolStr),
    /// Binary.
    Bytes(Vec<u8>),
    /// UUID.
    Uuid(Uuid),
    /// Timestamp.
    Timestamp(DateTime<Utc>),
    /// Date.
    Date(NaiveDate),
}

impl From<KeyValue> for Value {
    fn from(key: KeyValue) -> Self {
        match key {
            KeyValue::Bool(v) => Value::Bool(v),
            KeyValue::Int(v) => Value::Int(v),
            KeyValue::Text(v) => Value::Text(v.to_string()),
            KeyValue::Bytes(v) => Value::Bytes(v),
            KeyValue::Uuid(v) => Value::Uuid(v),
            KeyValue::Timestamp(v) => Value::Timestamp(v),
            KeyValue::Date(v) => Value::Date(v),
        }
    }
}

/// A key tuple. Single-column keys stay inline.
pub type RowKey = SmallVec<[KeyValue; 2]>;

/// Conversion out of a [`Value`] into a field type.
pub trait FromValue: Sized {
    /// Convert, failing with a data error on a type mismatch.
    fn from_value(value: Value) -> QueryResult<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> QueryResult<T> {
    Err(QueryError::deserialization(format!(
        "expected {}, found {}",
        expected,
        value.type_name()
    )))
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> QueryResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => mismatch("bool", &other),
        }
    }
}

macro_rules! int_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> QueryResult<Self> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(v).map_err(|_| {
                            QueryError::deserialization(format!(
                                "{} does not fit in {}",
                                v,
                                stringify!($ty)
                            ))
                        }),
                        other => mismatch(stringify!($ty), &other),
                    }
                }
            }
        )*
    };
}

int_from_value!(i16, i32, i64);

impl FromValue for f64 {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => mismatch("f64", &other),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> QueryResult<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => mismatch("text", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => mismatch("bytes", &other),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Uuid(v) => Ok(v),
            other => mismatch("uuid", &other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => mismatch("timestamp", &other),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Date(v) => Ok(v),
            other => mismatch("date", &other),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Json(v) => Ok(v),
            other => mismatch("json", &other),
        }
    }
}

macro_rules! scalar_into_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

scalar_into_value! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Array columns. `Vec<u8>` is `bytea`, so arrays are listed per element type.
macro_rules! array_value {
    ($($ty:ty),*) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(v: Vec<$ty>) -> Self {
                    Value::Array(v.into_iter().map(Value::from).collect())
                }
            }

            impl FromValue for Vec<$ty> {
                fn from_value(value: Value) -> QueryResult<Self> {
                    match value {
                        Value::Array(items) => items.into_iter().map(<$ty>::from_value).collect(),
                        other => mismatch("array", &other),
                    }
                }
            }
        )*
    };
}

array_value!(bool, i16, i32, i64, f64, String, Uuid);
