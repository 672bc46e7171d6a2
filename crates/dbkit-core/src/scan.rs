//! Scan destinations for result columns.

use crate::error::{Error, Result, TypeError};
use crate::nullable::Nullable;
use crate::scalar::{Scalar, Timestamp};
use crate::value::Value;

/// A destination a driver value can be decoded into.
///
/// Row helpers ask a binder for one `&mut dyn Scan` per column and scan
/// the row's values into them in order.
pub trait Scan {
    /// Decode `value` into `self`.
    fn scan(&mut self, value: &Value) -> Result<()>;
}

/// Destinations for one row, in column order.
pub type Destinations<'r> = Vec<&'r mut dyn Scan>;

/// Build [`Destinations`] from places, borrowing each mutably.
///
/// ```
/// use dbkit_core::{Destinations, Nullable, dests};
///
/// let mut id = 0_i64;
/// let mut email = Nullable::<String>::null();
/// let row: Destinations<'_> = dests![id, email];
/// assert_eq!(row.len(), 2);
/// ```
#[macro_export]
macro_rules! dests {
    ($($place:expr),* $(,)?) => {
        vec![$(&mut $place as &mut dyn $crate::Scan),*]
    };
}

impl<T: Scalar> Scan for Nullable<T> {
    fn scan(&mut self, value: &Value) -> Result<()> {
        Nullable::scan(self, value)
    }
}

impl<T: Scalar> Scan for Option<T> {
    fn scan(&mut self, value: &Value) -> Result<()> {
        *self = if value.is_null() {
            None
        } else {
            Some(T::coerce(value)?)
        };
        Ok(())
    }
}

impl Scan for Value {
    fn scan(&mut self, value: &Value) -> Result<()> {
        self.clone_from(value);
        Ok(())
    }
}

macro_rules! strict_scan {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scan for $ty {
                fn scan(&mut self, value: &Value) -> Result<()> {
                    if value.is_null() {
                        return Err(Error::Type(TypeError::coercion::<$ty>(
                            <$ty as Scalar>::KIND,
                            "NULL",
                        )));
                    }
                    *self = <$ty as Scalar>::coerce(value)?;
                    Ok(())
                }
            }
        )*
    };
}

strict_scan!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, Timestamp);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_scalars_reject_null() {
        let mut n = 0_i64;
        n.scan(&Value::Int(4)).unwrap();
        assert_eq!(n, 4);

        let err = n.scan(&Value::Null).unwrap_err();
        assert!(matches!(err, Error::Type(_)));
        assert_eq!(n, 4);
    }

    #[test]
    fn option_destination() {
        let mut name: Option<String> = Some("old".into());
        name.scan(&Value::Null).unwrap();
        assert_eq!(name, None);
        name.scan(&Value::Text("new".into())).unwrap();
        assert_eq!(name.as_deref(), Some("new"));
    }

    #[test]
    fn destinations_scan_in_order() {
        let mut id = 0_i64;
        let mut email = Nullable::<String>::null();
        let mut raw = Value::Null;
        {
            let dests: Destinations<'_> = crate::dests![id, email, raw];
            let values = [Value::BigInt(1), Value::Text("a@b.c".into()), Value::Bool(true)];
            for (dest, value) in dests.into_iter().zip(values.iter()) {
                dest.scan(value).unwrap();
            }
        }
        assert_eq!(id, 1);
        assert_eq!(email, Nullable::from_value("a@b.c".to_string()));
        assert_eq!(raw, Value::Bool(true));
    }
}
