//! UPDATE statement builder.

use super::{normalize, require_table};
use crate::clause::{Conditions, Filter};
use crate::error::{SqlError, SqlResult};
use crate::executor::Executor;
use crate::render::{Rendered, Renderer};
use crate::validate::{validate_identifier, validate_table_expression};
use crate::value::Value;

/// UPDATE builder bound to an executor.
///
/// An UPDATE without any WHERE condition is allowed and rewrites every row
/// of the table.
pub struct Update<'e, E> {
    executor: &'e E,
    table: Option<String>,
    sets: Vec<(String, Value)>,
    conditions: Conditions,
}

impl<E> std::fmt::Debug for Update<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Update")
            .field("table", &self.table)
            .field("sets", &self.sets.len())
            .field("conditions", &self.conditions.len())
            .finish_non_exhaustive()
    }
}

impl<E> Filter for Update<'_, E> {
    fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self.conditions
    }
}

impl<'e, E: Executor> Update<'e, E> {
    pub(crate) fn new(executor: &'e E) -> Self {
        Self {
            executor,
            table: None,
            sets: Vec::new(),
            conditions: Conditions::new(),
        }
    }

    pub fn table(mut self, table: &str) -> SqlResult<Self> {
        validate_table_expression(table)?;
        self.table = Some(normalize(table));
        Ok(self)
    }

    /// `column = value` in the SET list.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> SqlResult<Self> {
        validate_identifier(column)?;
        self.sets.push((column.to_string(), value.into()));
        Ok(self)
    }

    /// [`set`](Update::set) for every pair, in iteration order.
    pub fn set_map<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> SqlResult<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (column, value) in pairs {
            self = self.set(column.as_ref(), value)?;
        }
        Ok(self)
    }

    /// Render without executing. SET markers come first, WHERE continues.
    pub fn build(&self) -> SqlResult<Rendered> {
        let table = require_table(&self.table)?;
        if self.sets.is_empty() {
            return Err(SqlError::NoFieldsToUpdate);
        }

        let mut r = Renderer::new();
        r.push("UPDATE ");
        r.push(table);
        r.push(" SET ");
        for (i, (column, value)) in self.sets.iter().enumerate() {
            if i > 0 {
                r.push(", ");
            }
            r.push(column);
            r.push(" = ");
            r.bind(value.clone());
        }
        r.conditions("WHERE", &self.conditions)?;
        Ok(r.finish())
    }

    /// Execute and return the number of updated rows.
    pub async fn exec(self) -> SqlResult<u64> {
        let Rendered { sql, args } = self.build()?;
        self.executor.execute(&sql, &args).await
    }
}
