//! Bound arguments and decoded column values.
//!
//! [`Value`] is the single currency between builders, executors and records:
//! every argument bound to a statement is converted into a `Value`, and every
//! column read back from the server is decoded into one before it reaches
//! [`Record::scan`](crate::record::Record::scan).

use crate::error::{ScanError, SqlError, SqlResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact `numeric` value.
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Json(serde_json::Value),
    /// One-dimensional array; elements may be [`Value::Null`].
    Array(Vec<Value>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Date(_) => "date",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
            Value::Array(_) => "array",
        }
    }

    /// Build an array value, e.g. for `tags && ?` or `id = ANY(?)`.
    pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert into a Rust type, reporting a [`ScanError`] on mismatch.
    ///
    /// ```ignore
    /// "age" => self.age = value.get()?,
    /// ```
    pub fn get<T: FromValue>(self) -> Result<T, ScanError> {
        T::from_value(self)
    }

    /// Decode column `idx` of a `tokio_postgres` row.
    pub(crate) fn from_pg_row(row: &tokio_postgres::Row, idx: usize) -> SqlResult<Self> {
        let column = &row.columns()[idx];
        let ty = column.type_();
        let fail = |e: tokio_postgres::Error| SqlError::decode(column.name(), e.to_string());

        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx).map_err(fail)?.map(Value::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)
                .map_err(fail)?
                .map(|v| Value::Int(i64::from(v)))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)
                .map_err(fail)?
                .map(|v| Value::Int(i64::from(v)))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx).map_err(fail)?.map(Value::Int)
        } else if *ty == Type::OID {
            row.try_get::<_, Option<u32>>(idx)
                .map_err(fail)?
                .map(|v| Value::Int(i64::from(v)))
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)
                .map_err(fail)?
                .map(|v| Value::Float(f64::from(v)))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(idx).map_err(fail)?.map(Value::Float)
        } else if *ty == Type::BYTEA {
            row.try_get::<_, Option<Vec<u8>>>(idx).map_err(fail)?.map(Value::Bytes)
        } else if *ty == Type::TIMESTAMP {
            row.try_get::<_, Option<NaiveDateTime>>(idx)
                .map_err(fail)?
                .map(Value::Timestamp)
        } else if *ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<DateTime<Utc>>>(idx)
                .map_err(fail)?
                .map(Value::TimestampTz)
        } else if *ty == Type::DATE {
            row.try_get::<_, Option<NaiveDate>>(idx).map_err(fail)?.map(Value::Date)
        } else if *ty == Type::UUID {
            row.try_get::<_, Option<Uuid>>(idx).map_err(fail)?.map(Value::Uuid)
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            row.try_get::<_, Option<serde_json::Value>>(idx)
                .map_err(fail)?
                .map(Value::Json)
        } else if *ty == Type::NUMERIC {
            row.try_get::<_, Option<Decimal>>(idx)
                .map_err(fail)?
                .map(Value::Decimal)
        } else if <String as FromSql<'_>>::accepts(ty) {
            row.try_get::<_, Option<String>>(idx).map_err(fail)?.map(Value::Text)
        } else if let Kind::Array(member) = ty.kind()
            && let Some(decoded) = decode_array(row, idx, member)
        {
            decoded.map_err(fail)?
        } else {
            return Err(SqlError::decode(
                column.name(),
                format!("unsupported column type `{}`", ty.name()),
            ));
        };

        Ok(value.unwrap_or(Value::Null))
    }
}

fn collect_array<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    idx: usize,
    wrap: impl Fn(T) -> Value,
) -> Result<Option<Value>, tokio_postgres::Error> {
    let items = row.try_get::<_, Option<Vec<Option<T>>>>(idx)?;
    Ok(items.map(|items| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map_or(Value::Null, &wrap))
                .collect(),
        )
    }))
}

/// Decode a one-dimensional array column; `None` for unsupported element types.
fn decode_array(
    row: &tokio_postgres::Row,
    idx: usize,
    member: &Type,
) -> Option<Result<Option<Value>, tokio_postgres::Error>> {
    let decoded = if *member == Type::BOOL {
        collect_array(row, idx, Value::Bool)
    } else if *member == Type::INT2 {
        collect_array(row, idx, |v: i16| Value::Int(i64::from(v)))
    } else if *member == Type::INT4 {
        collect_array(row, idx, |v: i32| Value::Int(i64::from(v)))
    } else if *member == Type::INT8 {
        collect_array(row, idx, Value::Int)
    } else if *member == Type::FLOAT4 {
        collect_array(row, idx, |v: f32| Value::Float(f64::from(v)))
    } else if *member == Type::FLOAT8 {
        collect_array(row, idx, Value::Float)
    } else if *member == Type::NUMERIC {
        collect_array(row, idx, Value::Decimal)
    } else if *member == Type::UUID {
        collect_array(row, idx, Value::Uuid)
    } else if *member == Type::DATE {
        collect_array(row, idx, Value::Date)
    } else if *member == Type::TIMESTAMP {
        collect_array(row, idx, Value::Timestamp)
    } else if *member == Type::TIMESTAMPTZ {
        collect_array(row, idx, Value::TimestampTz)
    } else if *member == Type::JSON || *member == Type::JSONB {
        collect_array(row, idx, Value::Json)
    } else if <String as FromSql<'_>>::accepts(member) {
        collect_array(row, idx, Value::Text)
    } else {
        return None;
    };
    Some(decoded)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            // Narrow to the column's integer width so `i64` args bind to int2/int4.
            Value::Int(v) => {
                if *ty == Type::INT2 {
                    i16::try_from(*v)?.to_sql_checked(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*v)?.to_sql_checked(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*v as f64).to_sql_checked(ty, out)
                } else if *ty == Type::NUMERIC {
                    Decimal::from(*v).to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql_checked(ty, out)
                } else if *ty == Type::NUMERIC {
                    Decimal::try_from(*v)?.to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            Value::Decimal(v) => {
                if *ty == Type::FLOAT8 {
                    f64::try_from(*v)?.to_sql_checked(ty, out)
                } else if *ty == Type::FLOAT4 {
                    f32::try_from(*v)?.to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            Value::Text(v) => v.as_str().to_sql_checked(ty, out),
            Value::Bytes(v) => v.as_slice().to_sql_checked(ty, out),
            Value::Timestamp(v) => v.to_sql_checked(ty, out),
            Value::TimestampTz(v) => v.to_sql_checked(ty, out),
            Value::Date(v) => v.to_sql_checked(ty, out),
            Value::Uuid(v) => v.to_sql_checked(ty, out),
            Value::Json(v) => v.to_sql_checked(ty, out),
            // Elements are encoded against the array's member type.
            Value::Array(items) => items.as_slice().to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Each variant re-checks against the concrete type in `to_sql`.
        true
    }

    to_sql_checked!();
}

macro_rules! value_from {
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

value_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveDate => Date,
    Uuid => Uuid,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

macro_rules! value_from_vec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(v: Vec<$ty>) -> Self {
                    Value::array(v)
                }
            }
        )*
    };
}

// `Vec<u8>` stays `Bytes`.
value_from_vec!(bool, i16, i32, i64, f64, Decimal, String, &str, Uuid);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion out of a [`Value`], used by record implementations.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ScanError>;
}

fn mismatch(expected: &'static str, found: &Value) -> ScanError {
    ScanError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Int(v) => Ok(v),
            // SUM(bigint) and friends come back as numeric.
            Value::Decimal(v) if v.fract().is_zero() => {
                i64::try_from(v).map_err(|_| ScanError::OutOfRange("i64"))
            }
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        let v = i64::from_value(value)?;
        i32::try_from(v).map_err(|_| ScanError::OutOfRange("i32"))
    }
}

impl FromValue for i16 {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        let v = i64::from_value(value)?;
        i16::try_from(v).map_err(|_| ScanError::OutOfRange("i16"))
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        let v = i64::from_value(value)?;
        u32::try_from(v).map_err(|_| ScanError::OutOfRange("u32"))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::Decimal(v) => f64::try_from(v).map_err(|_| ScanError::OutOfRange("f64")),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Decimal(v) => Ok(v),
            Value::Int(v) => Ok(Decimal::from(v)),
            Value::Float(v) => Decimal::try_from(v).map_err(|_| ScanError::OutOfRange("decimal")),
            other => Err(mismatch("decimal", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::TimestampTz(v) => Ok(v),
            Value::Timestamp(v) => Ok(v.and_utc()),
            other => Err(mismatch("timestamptz", &other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Date(v) => Ok(v),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Uuid(v) => Ok(v),
            other => Err(mismatch("uuid", &other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Json(v) => Ok(v),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("array", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ScanError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Anything that can be bound as the arguments of one condition template.
///
/// Implemented for `()`, arrays, `Vec<Value>` and tuples of up to six items:
///
/// ```ignore
/// .where_("deleted_at IS NULL", ())
/// .where_("age > ?", [18])
/// .where_("status = ? AND age > ?", ("active", 18))
/// ```
pub trait IntoArgs {
    fn into_args(self) -> Vec<Value>;
}

impl IntoArgs for () {
    fn into_args(self) -> Vec<Value> {
        Vec::new()
    }
}

impl IntoArgs for Vec<Value> {
    fn into_args(self) -> Vec<Value> {
        self
    }
}

impl<T: Into<Value>, const N: usize> IntoArgs for [T; N] {
    fn into_args(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

macro_rules! tuple_args {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> IntoArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_args(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_args!(A);
tuple_args!(A, B);
tuple_args!(A, B, C);
tuple_args!(A, B, C, D);
tuple_args!(A, B, C, D, E);
tuple_args!(A, B, C, D, E, F);
