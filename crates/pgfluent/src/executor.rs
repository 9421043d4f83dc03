//! The execution seam shared by the pool and transactions.

use crate::builder::{Delete, Insert, Select, Update};
use crate::error::SqlResult;
use crate::record::Rows;
use crate::render::{Rendered, Renderer};
use crate::value::{IntoArgs, Value};
use std::future::Future;
use tokio_postgres::types::ToSql;

/// Something that can run SQL with `$n` markers and positional arguments.
///
/// [`Connection`](crate::Connection) and [`Transaction`](crate::Transaction)
/// implement it, so every builder works the same against either. Test doubles
/// only need [`execute`](Executor::execute) and [`query`](Executor::query).
pub trait Executor: Send + Sync {
    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str, args: &[Value]) -> impl Future<Output = SqlResult<u64>> + Send;

    /// Run a statement and return every row it produced.
    fn query(&self, sql: &str, args: &[Value]) -> impl Future<Output = SqlResult<Rows>> + Send;

    /// Run a raw template, translating its `?` tokens to `$n` markers.
    ///
    /// ```ignore
    /// db.exec("UPDATE counters SET hits = hits + 1 WHERE id = ?", [7]).await?;
    /// ```
    fn exec(&self, template: &str, args: impl IntoArgs) -> impl Future<Output = SqlResult<u64>> + Send
    where
        Self: Sized,
    {
        let rendered = render_template(template, &args.into_args());
        async move {
            let Rendered { sql, args } = rendered?;
            self.execute(&sql, &args).await
        }
    }

    /// Start a SELECT statement.
    fn select(&self) -> Select<'_, Self>
    where
        Self: Sized,
    {
        Select::new(self)
    }

    /// Start an INSERT statement.
    fn insert(&self) -> Insert<'_, Self>
    where
        Self: Sized,
    {
        Insert::new(self)
    }

    /// Start an UPDATE statement.
    fn update(&self) -> Update<'_, Self>
    where
        Self: Sized,
    {
        Update::new(self)
    }

    /// Start a DELETE statement.
    fn delete(&self) -> Delete<'_, Self>
    where
        Self: Sized,
    {
        Delete::new(self)
    }
}

pub(crate) fn render_template(template: &str, args: &[Value]) -> SqlResult<Rendered> {
    let mut r = Renderer::new();
    r.template(template, args)?;
    Ok(r.finish())
}

/// Borrow arguments in the shape `tokio_postgres` expects.
pub(crate) fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}
