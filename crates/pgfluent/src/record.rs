//! Row materialization without reflection.
//!
//! A type opts in by implementing [`Record`]: the materializer walks each
//! row's columns in server order and hands every `(name, value)` pair to
//! [`Record::scan`], which is responsible for coercion and assignment.
//!
//! ```ignore
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! impl Record for User {
//!     fn scan(&mut self, column: &str, value: Value) -> Result<(), ScanError> {
//!         match column {
//!             "id" => self.id = value.get()?,
//!             "name" => self.name = value.get()?,
//!             "email" => self.email = value.get()?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::{ScanError, SqlError, SqlResult};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A caller type that can be filled from a result row, one column at a time.
pub trait Record {
    fn scan(&mut self, column: &str, value: Value) -> Result<(), ScanError>;
}

impl Record for BTreeMap<String, Value> {
    fn scan(&mut self, column: &str, value: Value) -> Result<(), ScanError> {
        self.insert(column.to_string(), value);
        Ok(())
    }
}

impl Record for HashMap<String, Value> {
    fn scan(&mut self, column: &str, value: Value) -> Result<(), ScanError> {
        self.insert(column.to_string(), value);
        Ok(())
    }
}

impl Record for Vec<(String, Value)> {
    fn scan(&mut self, column: &str, value: Value) -> Result<(), ScanError> {
        self.push((column.to_string(), value));
        Ok(())
    }
}

/// One decoded result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the named column, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Feed every column to `record`, stopping at the first failure.
    pub fn scan_into<R: Record + ?Sized>(self, record: &mut R) -> SqlResult<()> {
        for (column, value) in self.columns.iter().zip(self.values) {
            record.scan(column, value).map_err(|source| SqlError::Scan {
                column: column.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// A fully read result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    columns: Arc<[String]>,
    rows: Vec<Vec<Value>>,
}

impl Rows {
    /// An empty result set with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: columns.into(),
            rows: Vec::new(),
        }
    }

    /// Append one row of values, in column order.
    pub fn push(&mut self, values: Vec<Value>) {
        self.rows.push(values);
    }

    /// Builder-style [`Rows::push`].
    pub fn with_row(mut self, values: Vec<Value>) -> Self {
        self.push(values);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decode `tokio_postgres` rows.
    pub(crate) fn from_pg(rows: &[tokio_postgres::Row]) -> SqlResult<Self> {
        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut out = Rows::new(columns);
        out.rows.reserve(rows.len());
        for row in rows {
            let values = (0..row.len())
                .map(|idx| Value::from_pg_row(row, idx))
                .collect::<SqlResult<Vec<_>>>()?;
            out.push(values);
        }
        Ok(out)
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = RowsIter;

    fn into_iter(self) -> Self::IntoIter {
        RowsIter {
            columns: self.columns,
            inner: self.rows.into_iter(),
        }
    }
}

/// Owning iterator over [`Rows`].
pub struct RowsIter {
    columns: Arc<[String]>,
    inner: std::vec::IntoIter<Vec<Value>>,
}

impl Iterator for RowsIter {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.inner.next().map(|values| Row {
            columns: Arc::clone(&self.columns),
            values,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Error from [`scan_all`] that keeps the records materialized before the failure.
#[derive(thiserror::Error)]
#[error("{error} ({} records materialized before the failure)", .records.len())]
pub struct PartialScan<R> {
    /// Records completed before the failure, in row order.
    pub records: Vec<R>,
    /// What went wrong.
    #[source]
    pub error: SqlError,
}

impl<R> PartialScan<R> {
    pub(crate) fn new(error: SqlError) -> Self {
        Self {
            records: Vec::new(),
            error,
        }
    }

    pub fn into_parts(self) -> (Vec<R>, SqlError) {
        (self.records, self.error)
    }
}

impl<R> fmt::Debug for PartialScan<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialScan")
            .field("records", &self.records.len())
            .field("error", &self.error)
            .finish()
    }
}

impl<R> From<PartialScan<R>> for SqlError {
    fn from(partial: PartialScan<R>) -> Self {
        partial.error
    }
}

/// Materialize the first row into `record`; [`SqlError::NoRows`] when empty.
pub fn scan_one<R: Record + ?Sized>(rows: Rows, record: &mut R) -> SqlResult<()> {
    match rows.into_iter().next() {
        Some(row) => row.scan_into(record),
        None => Err(SqlError::NoRows),
    }
}

/// Materialize every row, calling `factory` for a fresh record each time.
///
/// Zero rows yield an empty `Vec`, never [`SqlError::NoRows`].
pub fn scan_all<R, F>(rows: Rows, mut factory: F) -> Result<Vec<R>, PartialScan<R>>
where
    R: Record,
    F: FnMut() -> R,
{
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let mut record = factory();
        if let Err(error) = row.scan_into(&mut record) {
            return Err(PartialScan { records, error });
        }
        records.push(record);
    }
    Ok(records)
}
