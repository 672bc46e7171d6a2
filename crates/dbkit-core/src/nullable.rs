//! Nullable column values.
//!
//! [`Nullable<T>`] pairs a [`Scalar`] with a validity flag, modelling SQL
//! NULL. It crosses two boundaries with different rules:
//!
//! - the **driver** boundary ([`Nullable::scan`] / [`Nullable::to_value`]),
//!   where absence is [`Value::Null`] and decoding is permissive, and
//! - the **text** boundary (`Serialize` / `Deserialize`,
//!   [`Nullable::decode_json`]), where absence is the `null` literal and
//!   decoding is strict.
//!
//! # Example
//!
//! ```
//! use dbkit_core::{Nullable, Value};
//!
//! let age = Nullable::from_value(42_i64);
//! assert_eq!(serde_json::to_string(&age).unwrap(), "42");
//! assert_eq!(age.to_value().unwrap(), Value::BigInt(42));
//!
//! let missing: Nullable<i64> = serde_json::from_str("null").unwrap();
//! assert!(missing.is_zero());
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::scalar::Scalar;
use crate::value::Value;

/// A scalar value that may be SQL NULL.
///
/// When `valid` is `false`, `val` is unspecified and must not be
/// interpreted; every accessor and encoder treats the instance as NULL.
#[derive(Debug, Clone, Default)]
pub struct Nullable<T: Scalar> {
    /// The underlying value. Meaningless when `valid` is false.
    pub val: T,
    /// True if the value is present (not NULL).
    pub valid: bool,
}

impl<T: Scalar> Nullable<T> {
    /// Create a nullable from a value and an explicit validity flag.
    pub fn new(val: T, valid: bool) -> Self {
        Self { val, valid }
    }

    /// Create a valid nullable.
    pub fn from_value(val: T) -> Self {
        Self::new(val, true)
    }

    /// Create a NULL nullable holding the zero value.
    pub fn null() -> Self {
        Self::new(T::default(), false)
    }

    /// Create a nullable that is NULL when `val` is `None`.
    pub fn from_option(val: Option<T>) -> Self {
        match val {
            Some(v) => Self::from_value(v),
            None => Self::null(),
        }
    }

    /// Create a nullable from an optional reference, copying the referent.
    pub fn from_ref(val: Option<&T>) -> Self {
        Self::from_option(val.cloned())
    }

    /// The value, or the zero value of `T` when NULL.
    pub fn value_or_zero(&self) -> T {
        if self.valid {
            self.val.clone()
        } else {
            T::default()
        }
    }

    /// Borrow the value, or `None` when NULL.
    pub fn as_ref(&self) -> Option<&T> {
        self.valid.then_some(&self.val)
    }

    /// Convert into an `Option`, `None` when NULL.
    pub fn into_option(self) -> Option<T> {
        self.valid.then_some(self.val)
    }

    /// True when NULL. A valid zero is *not* zero in this sense.
    pub fn is_zero(&self) -> bool {
        !self.valid
    }

    /// Set the value and mark it valid.
    pub fn set_valid(&mut self, val: T) {
        self.val = val;
        self.valid = true;
    }

    /// Decode a native driver value into this nullable.
    ///
    /// [`Value::Null`] resets to NULL with a zeroed value. Any other value
    /// is coerced into `T`; on failure the instance is left NULL and the
    /// coercion error is returned.
    pub fn scan(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            self.val = T::default();
            self.valid = false;
            return Ok(());
        }
        match T::coerce(value) {
            Ok(val) => {
                self.set_valid(val);
                Ok(())
            }
            Err(e) => {
                tracing::debug!(
                    kind = T::KIND,
                    value_type = value.type_name(),
                    error = %e,
                    "Driver value coercion failed"
                );
                self.val = T::default();
                self.valid = false;
                Err(e)
            }
        }
    }

    /// Encode into the native driver protocol; NULL becomes [`Value::Null`].
    pub fn to_value(&self) -> Result<Value> {
        if self.valid {
            self.val.to_value()
        } else {
            Ok(Value::Null)
        }
    }

    /// Decode a JSON payload in place.
    ///
    /// The `null` literal yields NULL. Anything else must decode strictly as
    /// `T`; on failure the instance is left NULL and the decode error is
    /// returned untouched, so callers can inspect `is_syntax()`/`is_data()`.
    pub fn decode_json(&mut self, data: &[u8]) -> std::result::Result<(), serde_json::Error> {
        match serde_json::from_slice::<Self>(data) {
            Ok(decoded) => {
                *self = decoded;
                Ok(())
            }
            Err(e) => {
                self.valid = false;
                Err(e)
            }
        }
    }
}

/// Equal when both are NULL (whatever their stale values), or both are
/// valid with equal values.
impl<T: Scalar> PartialEq for Nullable<T> {
    fn eq(&self, other: &Self) -> bool {
        self.valid == other.valid && (!self.valid || self.val == other.val)
    }
}

impl<T: Scalar + Eq> Eq for Nullable<T> {}

impl<T: Scalar> From<T> for Nullable<T> {
    fn from(val: T) -> Self {
        Self::from_value(val)
    }
}

impl<T: Scalar> From<Option<T>> for Nullable<T> {
    fn from(val: Option<T>) -> Self {
        Self::from_option(val)
    }
}

impl<T: Scalar> From<Nullable<T>> for Option<T> {
    fn from(val: Nullable<T>) -> Self {
        val.into_option()
    }
}

impl<T: Scalar> fmt::Display for Nullable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "{}", self.val)
        } else {
            write!(f, "NULL")
        }
    }
}

impl<T: Scalar> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.valid {
            self.val.encode_text(serializer)
        } else {
            serializer.serialize_none()
        }
    }
}

/// A present text literal, decoded through [`Scalar::decode_text`].
struct Present<T>(T);

impl<'de, T: Scalar> Deserialize<'de> for Present<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        T::decode_text(deserializer).map(Present)
    }
}

impl<'de, T: Scalar> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let present = Option::<Present<T>>::deserialize(deserializer)?;
        Ok(Self::from_option(present.map(|Present(val)| val)))
    }
}
