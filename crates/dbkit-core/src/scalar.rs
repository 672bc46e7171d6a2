//! The closed set of scalar kinds a [`Nullable`](crate::Nullable) can hold.
//!
//! Each kind knows how to encode itself into a driver [`Value`] and how to
//! coerce a driver value back. Coercion is permissive (the driver layer is
//! allowed to widen, parse and re-render) but every conversion goes through
//! an explicit table with a single failure branch per kind.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::de::{self, DeserializeOwned};
use serde::ser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result, TypeError};
use crate::value::Value;

/// Timestamp scalar: an instant in UTC.
pub type Timestamp = DateTime<Utc>;

mod sealed {
    pub trait Sealed {}
}

/// A scalar kind storable in a nullable column.
///
/// Implemented for `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`,
/// `f32`, `f64`, `bool`, `String` and [`Timestamp`]. The trait is sealed.
pub trait Scalar:
    sealed::Sealed
    + Clone
    + PartialEq
    + Default
    + fmt::Debug
    + fmt::Display
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Short name of the kind, used in type errors.
    const KIND: &'static str;

    /// Best-effort conversion of a non-null driver value into this kind.
    fn coerce(value: &Value) -> Result<Self>;

    /// Encode into the driver value protocol.
    fn to_value(&self) -> Result<Value>;

    /// Encode a present value as a text literal.
    ///
    /// Kinds with values the text format cannot carry must fail here rather
    /// than emit a literal that reads back as something else.
    fn encode_text<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.serialize(serializer)
    }

    /// Decode a present (non-null) text literal, strictly.
    fn decode_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        <Self as Deserialize<'de>>::deserialize(deserializer)
    }
}

fn mismatch<T: Scalar>(value: &Value) -> Error {
    Error::Type(TypeError::coercion::<T>(T::KIND, value.type_name()))
}

fn out_of_range<T: Scalar>(value: &Value, rendered: impl fmt::Display) -> Error {
    Error::Type(TypeError::coercion::<T>(
        T::KIND,
        format!("{} value {} out of range", value.type_name(), rendered),
    ))
}

fn textual(value: &Value) -> Option<&str> {
    match value {
        Value::Text(s) | Value::Decimal(s) => Some(s),
        Value::Bytes(b) => std::str::from_utf8(b).ok(),
        _ => None,
    }
}

fn whole_number(v: f64) -> Option<i64> {
    // 2^63 is not representable as i64, hence the strict upper bound.
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn coerce_integer<T>(value: &Value) -> Result<T>
where
    T: Scalar + TryFrom<i64> + FromStr,
{
    let wide = match value {
        Value::Float(v) => whole_number(f64::from(*v)),
        Value::Double(v) => whole_number(*v),
        other => other.as_i64(),
    };
    if let Some(wide) = wide {
        return T::try_from(wide).map_err(|_| out_of_range::<T>(value, wide));
    }
    match textual(value) {
        Some(text) => text.parse::<T>().map_err(|_| mismatch::<T>(value)),
        None => Err(mismatch::<T>(value)),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn render_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

macro_rules! integer_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Scalar for $ty {
                const KIND: &'static str = stringify!($ty);

                fn coerce(value: &Value) -> Result<Self> {
                    coerce_integer::<$ty>(value)
                }

                fn to_value(&self) -> Result<Value> {
                    Ok(Value::from(*self))
                }
            }
        )*
    };
}

integer_scalar!(i8, i16, i32, i64, u8, u16, u32);

impl sealed::Sealed for u64 {}

impl Scalar for u64 {
    const KIND: &'static str = "u64";

    fn coerce(value: &Value) -> Result<Self> {
        coerce_integer::<u64>(value)
    }

    fn to_value(&self) -> Result<Value> {
        Value::try_from(*self)
    }
}

impl sealed::Sealed for f64 {}

impl Scalar for f64 {
    const KIND: &'static str = "f64";

    fn coerce(value: &Value) -> Result<Self> {
        if let Some(v) = value.as_f64() {
            return Ok(v);
        }
        match textual(value) {
            Some(text) => text.parse().map_err(|_| mismatch::<f64>(value)),
            None => Err(mismatch::<f64>(value)),
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Double(*self))
    }

    fn encode_text<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if !self.is_finite() {
            return Err(ser::Error::custom(format_args!("unsupported f64 value: {self}")));
        }
        serializer.serialize_f64(*self)
    }
}

impl sealed::Sealed for f32 {}

impl Scalar for f32 {
    const KIND: &'static str = "f32";

    fn coerce(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Double(v) => {
                let narrowed = *v as f32;
                if narrowed.is_infinite() && !v.is_infinite() {
                    Err(out_of_range::<f32>(value, v))
                } else {
                    Ok(narrowed)
                }
            }
            other => {
                if let Some(v) = other.as_i64() {
                    return Ok(v as f32);
                }
                match textual(other) {
                    Some(text) => text.parse().map_err(|_| mismatch::<f32>(other)),
                    None => Err(mismatch::<f32>(other)),
                }
            }
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Float(*self))
    }

    fn encode_text<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if !self.is_finite() {
            return Err(ser::Error::custom(format_args!("unsupported f32 value: {self}")));
        }
        serializer.serialize_f32(*self)
    }

    fn decode_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let wide = f64::deserialize(deserializer)?;
        let narrowed = wide as f32;
        if narrowed.is_infinite() && wide.is_finite() {
            return Err(de::Error::custom(format_args!("number {wide} out of range for f32")));
        }
        Ok(narrowed)
    }
}

impl sealed::Sealed for bool {}

impl Scalar for bool {
    const KIND: &'static str = "bool";

    fn coerce(value: &Value) -> Result<Self> {
        if let Value::Bool(v) = value {
            return Ok(*v);
        }
        if let Some(v) = value.as_i64() {
            return match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(out_of_range::<bool>(value, v)),
            };
        }
        textual(value)
            .and_then(parse_bool)
            .ok_or_else(|| mismatch::<bool>(value))
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bool(*self))
    }
}

impl sealed::Sealed for String {}

impl Scalar for String {
    const KIND: &'static str = "string";

    fn coerce(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| mismatch::<String>(value)),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Double(v) => Ok(v.to_string()),
            Value::Json(v) => Ok(v.to_string()),
            Value::Date(_) | Value::Timestamp(_) | Value::TimestampTz(_) => {
                let ts = Timestamp::coerce(value)?;
                Ok(if matches!(value, Value::Date(_)) {
                    ts.date_naive().to_string()
                } else {
                    render_timestamp(&ts)
                })
            }
            other => other
                .as_i64()
                .map(|v| v.to_string())
                .ok_or_else(|| mismatch::<String>(other)),
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Text(self.clone()))
    }
}

impl sealed::Sealed for Timestamp {}

impl Scalar for Timestamp {
    const KIND: &'static str = "timestamp";

    fn coerce(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(micros) | Value::TimestampTz(micros) => {
                DateTime::from_timestamp_micros(*micros)
                    .ok_or_else(|| out_of_range::<Timestamp>(value, micros))
            }
            Value::Date(days) => DateTime::from_timestamp(i64::from(*days) * 86_400, 0)
                .ok_or_else(|| out_of_range::<Timestamp>(value, days)),
            other => textual(other)
                .and_then(parse_timestamp)
                .ok_or_else(|| mismatch::<Timestamp>(other)),
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::TimestampTz(self.timestamp_micros()))
    }
}
