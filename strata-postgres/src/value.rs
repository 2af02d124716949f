//! Conversions between [`Value`] and the PostgreSQL wire format.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres_types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use strata_query::Value;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::{PgError, PgResult};

/// A [`Value`] bound as a statement parameter.
///
/// Encodes to whatever type the server inferred for the placeholder, so an
/// `Int` key can be compared against `int2`, `int4` or `int8` columns alike.
#[derive(Debug)]
pub struct PgValue<'a>(pub &'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => v.to_string().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Text(v) => {
                if matches!(ty.kind(), Kind::Enum(_)) {
                    out.extend_from_slice(v.as_bytes());
                    Ok(IsNull::No)
                } else {
                    v.as_str().to_sql(ty, out)
                }
            }
            Value::Bytes(v) => v.as_slice().to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Date(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
            Value::Array(items) => match ty.kind() {
                Kind::Array(_) => items.iter().map(PgValue).collect::<Vec<_>>().to_sql(ty, out),
                _ => Err(format!("cannot bind an array to a parameter of type {}", ty).into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Wrap parameters for a tokio-postgres call.
pub fn params(values: &[Value]) -> Vec<PgValue<'_>> {
    values.iter().map(PgValue).collect()
}

/// Any value read as its raw text form. Used for enum labels, whose binary
/// encoding is the label itself.
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Any value read as its raw binary wire form.
struct RawBytes(Vec<u8>);

impl<'a> FromSql<'a> for RawBytes {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, index: usize) -> PgResult<Option<T>> {
    row.try_get::<_, Option<T>>(index).map_err(|e| {
        PgError::decode(format!("column '{}': {}", row.columns()[index].name(), e))
    })
}

fn scalar<'a, T: FromSql<'a>>(row: &'a Row, index: usize, wrap: impl Fn(T) -> Value) -> PgResult<Value> {
    Ok(get::<T>(row, index)?.map(wrap).unwrap_or(Value::Null))
}

fn array<'a, T: FromSql<'a>>(row: &'a Row, index: usize, wrap: impl Fn(T) -> Value) -> PgResult<Value> {
    Ok(match get::<Vec<Option<T>>>(row, index)? {
        Some(items) => Value::Array(
            items
                .into_iter()
                .map(|item| item.map(&wrap).unwrap_or(Value::Null))
                .collect(),
        ),
        None => Value::Null,
    })
}

/// Decode one column of a row by its server-side type.
///
/// Types without a [`Value`] counterpart decode to their raw binary form.
pub fn decode(row: &Row, index: usize) -> PgResult<Value> {
    let ty = row.columns()[index].type_();
    match *ty {
        Type::BOOL => scalar(row, index, Value::Bool),
        Type::INT2 => scalar(row, index, |v: i16| Value::Int(v.into())),
        Type::INT4 => scalar(row, index, |v: i32| Value::Int(v.into())),
        Type::INT8 => scalar(row, index, Value::Int),
        Type::OID => scalar(row, index, |v: u32| Value::Int(v.into())),
        Type::FLOAT4 => scalar(row, index, |v: f32| Value::Float(v.into())),
        Type::FLOAT8 => scalar(row, index, Value::Float),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => scalar(row, index, Value::Text),
        Type::BYTEA => scalar(row, index, Value::Bytes),
        Type::UUID => scalar(row, index, Value::Uuid),
        Type::TIMESTAMPTZ => scalar(row, index, |v: DateTime<Utc>| Value::Timestamp(v)),
        Type::TIMESTAMP => scalar(row, index, |v: NaiveDateTime| Value::Timestamp(v.and_utc())),
        Type::DATE => scalar(row, index, |v: NaiveDate| Value::Date(v)),
        Type::JSON | Type::JSONB => scalar(row, index, Value::Json),
        Type::BOOL_ARRAY => array(row, index, Value::Bool),
        Type::INT2_ARRAY => array(row, index, |v: i16| Value::Int(v.into())),
        Type::INT4_ARRAY => array(row, index, |v: i32| Value::Int(v.into())),
        Type::INT8_ARRAY => array(row, index, Value::Int),
        Type::FLOAT8_ARRAY => array(row, index, Value::Float),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => array(row, index, Value::Text),
        Type::UUID_ARRAY => array(row, index, |v: Uuid| Value::Uuid(v)),
        _ => match ty.kind() {
            Kind::Enum(_) => scalar(row, index, |v: RawText| Value::Text(v.0)),
            Kind::Array(member) if matches!(member.kind(), Kind::Enum(_)) => {
                array(row, index, |v: RawText| Value::Text(v.0))
            }
            _ => scalar(row, index, |v: RawBytes| Value::Bytes(v.0)),
        },
    }
}

/// Decode every column of a row, in result order.
pub fn decode_row(row: &Row) -> PgResult<Vec<Value>> {
    (0..row.len()).map(|index| decode(row, index)).collect()
}
