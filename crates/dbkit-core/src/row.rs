//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::scalar::Scalar;
use crate::scan::Scan;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
///
/// Column metadata is shared via `Arc` so rows from one result set do not
/// each carry a copy of the column names.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get the shared column metadata.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get a typed, non-null value by column index.
    pub fn get_as<T: Scalar>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            Error::Type(TypeError {
                expected: T::KIND,
                actual: format!(
                    "index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
                column: None,
                rust_type: None,
            })
        })?;
        coerce_column(value, self.columns.names().get(index).map(String::as_str))
    }

    /// Get a typed, non-null value by column name.
    pub fn get_named<T: Scalar>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: T::KIND,
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
                rust_type: None,
            })
        })?;
        coerce_column(value, Some(name))
    }

    /// Scan every column into the matching destination, in order.
    ///
    /// The number of destinations must equal the number of columns.
    pub fn scan_into(&self, dests: &mut [&mut dyn Scan]) -> Result<()> {
        if dests.len() != self.values.len() {
            return Err(Error::Type(TypeError {
                expected: "one destination per column",
                actual: format!(
                    "{} destinations for {} columns",
                    dests.len(),
                    self.values.len()
                ),
                column: None,
                rust_type: None,
            }));
        }
        for (i, (dest, value)) in dests.iter_mut().zip(&self.values).enumerate() {
            let column = self.columns.names().get(i).map(String::as_str);
            dest.scan(value).map_err(|e| with_column(e, column))?;
        }
        Ok(())
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

fn with_column(err: Error, column: Option<&str>) -> Error {
    match err {
        Error::Type(mut te) => {
            te.column = column.map(str::to_string);
            Error::Type(te)
        }
        e => e,
    }
}

fn coerce_column<T: Scalar>(value: &Value, column: Option<&str>) -> Result<T> {
    if value.is_null() {
        return Err(with_column(
            Error::Type(TypeError {
                expected: T::KIND,
                actual: "NULL".to_string(),
                column: None,
                rust_type: Some(std::any::type_name::<T>()),
            }),
            column,
        ));
    }
    T::coerce(value).map_err(|e| with_column(e, column))
}
