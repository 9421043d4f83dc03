//! DELETE statement builder.

use super::{normalize, require_table};
use crate::clause::{Conditions, Filter};
use crate::error::SqlResult;
use crate::executor::Executor;
use crate::render::{Rendered, Renderer};
use crate::validate::validate_table_expression;

/// DELETE builder bound to an executor.
///
/// **A DELETE with no WHERE condition removes every row of the table.** It is
/// not rejected; check [`Filter::has_conditions`] first if that matters.
pub struct Delete<'e, E> {
    executor: &'e E,
    table: Option<String>,
    conditions: Conditions,
}

impl<E> std::fmt::Debug for Delete<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delete")
            .field("table", &self.table)
            .field("conditions", &self.conditions.len())
            .finish_non_exhaustive()
    }
}

impl<E> Filter for Delete<'_, E> {
    fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Conditions {
        &mut self.conditions
    }
}

impl<'e, E: Executor> Delete<'e, E> {
    pub(crate) fn new(executor: &'e E) -> Self {
        Self {
            executor,
            table: None,
            conditions: Conditions::new(),
        }
    }

    pub fn table(mut self, table: &str) -> SqlResult<Self> {
        validate_table_expression(table)?;
        self.table = Some(normalize(table));
        Ok(self)
    }

    /// Render without executing.
    pub fn build(&self) -> SqlResult<Rendered> {
        let table = require_table(&self.table)?;
        let mut r = Renderer::new();
        r.push("DELETE FROM ");
        r.push(table);
        r.conditions("WHERE", &self.conditions)?;
        Ok(r.finish())
    }

    /// Execute and return the number of deleted rows.
    pub async fn exec(self) -> SqlResult<u64> {
        let Rendered { sql, args } = self.build()?;
        self.executor.execute(&sql, &args).await
    }
}
