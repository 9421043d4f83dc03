//! INSERT statement builder.

use super::require_table;
use crate::error::{SqlError, SqlResult};
use crate::executor::Executor;
use crate::record::{Record, scan_one};
use crate::render::{Rendered, Renderer};
use crate::validate::{validate_field_expression, validate_identifier, validate_table_name};
use crate::value::{IntoArgs, Value};

/// INSERT builder bound to an executor.
///
/// Call [`values`](Insert::values) once per row for a multi-row insert.
pub struct Insert<'e, E> {
    executor: &'e E,
    table: Option<String>,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    returning: Vec<String>,
}

impl<E> std::fmt::Debug for Insert<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Insert")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .finish_non_exhaustive()
    }
}

impl<'e, E: Executor> Insert<'e, E> {
    pub(crate) fn new(executor: &'e E) -> Self {
        Self {
            executor,
            table: None,
            columns: Vec::new(),
            rows: Vec::new(),
            returning: Vec::new(),
        }
    }

    /// Target table, optionally schema-qualified. Aliases are rejected.
    pub fn table(mut self, table: &str) -> SqlResult<Self> {
        validate_table_name(table)?;
        self.table = Some(table.trim().to_string());
        Ok(self)
    }

    /// Column list. Replaces any earlier call.
    pub fn columns(mut self, columns: &[&str]) -> SqlResult<Self> {
        for column in columns {
            validate_identifier(column)?;
        }
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        Ok(self)
    }

    /// Append one row of values, in column order.
    pub fn values(mut self, values: impl IntoArgs) -> Self {
        self.rows.push(values.into_args());
        self
    }

    /// Columns for the RETURNING clause.
    pub fn returning(mut self, columns: &[&str]) -> SqlResult<Self> {
        for column in columns {
            validate_field_expression(column)?;
        }
        self.returning = columns.iter().map(|c| c.trim().to_string()).collect();
        Ok(self)
    }

    /// Render without executing.
    pub fn build(&self) -> SqlResult<Rendered> {
        let returning = (!self.returning.is_empty()).then(|| self.returning.join(", "));
        self.render(returning.as_deref())
    }

    fn render(&self, returning: Option<&str>) -> SqlResult<Rendered> {
        let table = require_table(&self.table)?;
        if self.columns.is_empty() {
            return Err(SqlError::MissingColumns);
        }
        if self.rows.is_empty() {
            return Err(SqlError::MissingValues);
        }
        if let Some(row) = self.rows.iter().find(|row| row.len() != self.columns.len()) {
            return Err(SqlError::ColumnValueMismatch {
                columns: self.columns.len(),
                values: row.len(),
            });
        }

        let mut r = Renderer::new();
        r.push("INSERT INTO ");
        r.push(table);
        r.push(" (");
        r.push(&self.columns.join(", "));
        r.push(") VALUES ");
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                r.push(", ");
            }
            r.push("(");
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    r.push(", ");
                }
                r.bind(value.clone());
            }
            r.push(")");
        }
        if let Some(returning) = returning {
            r.push(" RETURNING ");
            r.push(returning);
        }
        Ok(r.finish())
    }

    /// Execute and return the number of inserted rows.
    pub async fn exec(self) -> SqlResult<u64> {
        let Rendered { sql, args } = self.build()?;
        self.executor.execute(&sql, &args).await
    }

    /// Execute with `RETURNING *` (or the [`returning`](Insert::returning)
    /// columns) and materialize the first returned row into `record`.
    pub async fn exec_returning<R: Record + ?Sized>(self, record: &mut R) -> SqlResult<()> {
        let returning = if self.returning.is_empty() {
            "*".to_string()
        } else {
            self.returning.join(", ")
        };
        let Rendered { sql, args } = self.render(Some(&returning))?;
        let rows = self.executor.query(&sql, &args).await?;
        scan_one(rows, record)
    }
}
