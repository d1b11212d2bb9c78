//! Dynamic SQL values.
//!
//! `Value` is what flows between models, statements and the backend. The
//! [`ToValue`]/[`FromValue`] pair converts field types in and out of it;
//! conversion out is lenient about integer widths and textual numbers since
//! text-protocol drivers report most columns as strings.

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically-typed SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    /// Arbitrary-precision number in text form.
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(Timestamp),
    Json(serde_json::Value),
    /// A list argument for an `IN (??)` placeholder.
    Array(Vec<Value>),
}

/// A normalized, hashable form of a key value.
///
/// Integers of every width collapse to `Int`, so an `INT` foreign key
/// matches a `BIGINT` primary key holding the same number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
        }
    }

    /// Integer view of the value, parsing textual numbers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Decimal(s) | Value::Text(s) => s.trim().parse().ok(),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating-point view of the value, parsing textual numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Decimal(s) | Value::Text(s) => s.trim().parse().ok(),
            Value::Bytes(b) => std::str::from_utf8(b).ok()?.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Decimal(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Key form used to match rows across tables; `None` for NULL and for
    /// values that cannot act as keys.
    pub fn as_key(&self) -> Option<RowKey> {
        match self {
            Value::Null | Value::Json(_) | Value::Array(_) => None,
            Value::Bool(_) | Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) => {
                self.as_i64().map(RowKey::Int)
            }
            Value::BigInt(v) => Some(RowKey::Int(*v)),
            Value::Float(_) | Value::Double(_) => {
                let f = self.as_f64()?;
                (f.fract() == 0.0 && f.abs() < 9.0e15).then(|| RowKey::Int(f as i64))
            }
            Value::Decimal(s) => Some(
                s.trim()
                    .parse()
                    .map_or_else(|_| RowKey::Text(s.clone()), RowKey::Int),
            ),
            Value::Text(s) => Some(RowKey::Text(s.clone())),
            Value::Bytes(b) => Some(
                std::str::from_utf8(b)
                    .map_or_else(|_| RowKey::Bytes(b.clone()), |s| RowKey::Text(s.to_string())),
            ),
            Value::Timestamp(ts) => Some(RowKey::Int(ts.as_micros())),
        }
    }

    /// Build an `Array` argument for an `IN (??)` placeholder.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToValue,
    {
        Value::Array(items.into_iter().map(|item| item.to_value()).collect())
    }

    /// The value as it is sent to the backend: zero timestamps become the
    /// sentinel, arrays are bound element-wise.
    #[must_use]
    pub fn for_binding(self) -> Self {
        match self {
            Value::Timestamp(ts) => Value::Timestamp(ts.for_binding()),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::for_binding).collect())
            }
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal(s) => write!(f, "{s}"),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => {
                write!(f, "x'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "'")
            }
            Value::Timestamp(ts) => write!(f, "'{ts}'"),
            Value::Json(j) => write!(f, "'{j}'"),
            Value::Array(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Conversion of a field value into a `Value`.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion of a `Value` back into a field type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(Error::scan(format!(
        "cannot convert {} value {value} into {expected}",
        value.type_name()
    )))
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Text(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::Text(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => match other.as_i64() {
                Some(v) => Ok(v != 0),
                None => mismatch("bool", other),
            },
        }
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::$variant((*self).into())
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let Some(wide) = value.as_i64() else {
                        return mismatch(stringify!($ty), value);
                    };
                    <$ty>::try_from(wide).map_err(|_| {
                        Error::scan(format!("{wide} is out of range for {}", stringify!($ty)))
                    })
                }
            }
        )*
    };
}

impl_integer! {
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    u8 => SmallInt,
    u16 => Int,
    u32 => BigInt,
}

impl ToValue for u64 {
    fn to_value(&self) -> Value {
        i64::try_from(*self).map_or_else(|_| Value::Decimal(self.to_string()), Value::BigInt)
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self> {
        if let Some(text) = value.as_str() {
            if let Ok(v) = text.trim().parse::<u64>() {
                return Ok(v);
            }
        }
        let Some(wide) = value.as_i64() else {
            return mismatch("u64", value);
        };
        u64::try_from(wide).map_err(|_| Error::scan(format!("{wide} is out of range for u64")))
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        (*self as u64).to_value()
    }
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Result<Self> {
        let wide = u64::from_value(value)?;
        usize::try_from(wide).map_err(|_| Error::scan(format!("{wide} is out of range for usize")))
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value.as_f64() {
            Some(v) => Ok(v as f32),
            None => mismatch("f32", value),
        }
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value.as_f64() {
            Some(v) => Ok(v),
            None => mismatch("f64", value),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_string())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone())
                .map_err(|e| Error::scan(format!("invalid UTF-8 in text column: {e}"))),
            Value::Null | Value::Array(_) => mismatch("String", value),
            Value::Json(j) => Ok(j.to_string()),
            Value::Timestamp(ts) => Ok(ts.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                Ok(value.as_i64().unwrap_or_default().to_string())
            }
            Value::Float(v) => Ok(v.to_string()),
            Value::Double(v) => Ok(v.to_string()),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) | Value::Decimal(s) => Ok(s.as_bytes().to_vec()),
            other => mismatch("bytes", other),
        }
    }
}

impl ToValue for Timestamp {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl FromValue for Timestamp {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            other => match other.as_str().and_then(Timestamp::parse) {
                Some(ts) => Ok(ts),
                None => mismatch("timestamp", other),
            },
        }
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Null => Ok(serde_json::Value::Null),
            other => match other.as_str() {
                Some(text) => serde_json::from_str(text)
                    .map_err(|e| Error::scan(format!("invalid JSON: {e}"))),
                None => mismatch("JSON", other),
            },
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    v.to_value()
                }
            }
        )*
    };
}

impl_from_for_value!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, &str, Vec<u8>, Timestamp,
);

impl<T: ToValue> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.to_value()
    }
}
