//! Explicit transactions on one pooled session.
//!
//! A [`Transaction`] implements [`Executor`], so the builders it hands out are
//! the same types the pool hands out and go through the same validation.
//!
//! ```ignore
//! let tx = db.begin().await?;
//! tx.update()
//!     .table("accounts")?
//!     .set("balance", 90)?
//!     .where_eq("id", 1)?
//!     .exec()
//!     .await?;
//! tx.insert()
//!     .table("ledger")?
//!     .columns(&["account_id", "delta"])?
//!     .values((1, -10))
//!     .exec()
//!     .await?;
//! tx.commit().await?;
//! ```
//!
//! Dropping a transaction without calling [`commit`](Transaction::commit) or
//! [`rollback`](Transaction::rollback) logs a warning and rolls it back on a
//! background task.

use crate::connection::{Connection, row_count};
use crate::error::{SqlError, SqlResult};
use crate::executor::{Executor, params};
use crate::log::{Failure, TARGET};
use crate::record::Rows;
use crate::validate::validate_identifier;
use crate::value::Value;
use deadpool_postgres::Object;
use std::fmt;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for [`Connection::begin_with`].
///
/// Unset options fall back to the session defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    isolation: Option<IsolationLevel>,
    read_only: Option<bool>,
    deferrable: Option<bool>,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    /// Only meaningful for `SERIALIZABLE READ ONLY` transactions.
    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = Some(deferrable);
        self
    }

    /// The `BEGIN` statement for these options.
    pub fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(level) = self.isolation {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(level.as_sql());
        }
        match self.read_only {
            Some(true) => sql.push_str(" READ ONLY"),
            Some(false) => sql.push_str(" READ WRITE"),
            None => {}
        }
        match self.deferrable {
            Some(true) => sql.push_str(" DEFERRABLE"),
            Some(false) => sql.push_str(" NOT DEFERRABLE"),
            None => {}
        }
        sql
    }
}

/// A transaction holding one pooled session until it is committed or rolled back.
pub struct Transaction<'c> {
    conn: &'c Connection,
    // Only `None` once commit, rollback or drop has taken the session.
    client: Option<Object>,
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("active", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl<'c> Transaction<'c> {
    /// Wrap a session on which `BEGIN` has already succeeded.
    pub(crate) fn new(conn: &'c Connection, client: Object) -> Self {
        Self {
            conn,
            client: Some(client),
        }
    }

    /// Commit and return the session to the pool.
    pub async fn commit(mut self) -> SqlResult<()> {
        self.finish("COMMIT").await
    }

    /// Roll back and return the session to the pool.
    pub async fn rollback(mut self) -> SqlResult<()> {
        self.finish("ROLLBACK").await
    }

    /// Create a savepoint named `name`.
    pub async fn savepoint(&self, name: &str) -> SqlResult<()> {
        validate_identifier(name)?;
        self.control(&format!("SAVEPOINT {name}")).await
    }

    /// Undo everything since savepoint `name`; the savepoint stays defined.
    pub async fn rollback_to(&self, name: &str) -> SqlResult<()> {
        validate_identifier(name)?;
        self.control(&format!("ROLLBACK TO SAVEPOINT {name}")).await
    }

    /// Forget savepoint `name`, keeping its changes.
    pub async fn release(&self, name: &str) -> SqlResult<()> {
        validate_identifier(name)?;
        self.control(&format!("RELEASE SAVEPOINT {name}")).await
    }

    async fn finish(&mut self, sql: &str) -> SqlResult<()> {
        self.conn.ensure_open()?;
        let client = self
            .client
            .take()
            .ok_or_else(|| SqlError::Transaction("transaction already finished".to_string()))?;
        let result = control(self.conn, &client, sql).await;
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                // The session state is unknown; do not hand it back to the pool.
                drop(Object::take(client));
                Err(err)
            }
        }
    }

    async fn control(&self, sql: &str) -> SqlResult<()> {
        let client = self.client()?;
        control(self.conn, client, sql).await
    }

    fn client(&self) -> SqlResult<&Object> {
        self.conn.ensure_open()?;
        self.client
            .as_ref()
            .ok_or_else(|| SqlError::Transaction("transaction already finished".to_string()))
    }
}

async fn control(conn: &Connection, client: &Object, sql: &str) -> SqlResult<()> {
    conn.logger()
        .run(sql, &[], |_: &()| 0, batch(client, sql))
        .await
        .map_err(|err| control_error(sql, err))
}

/// Report a failed transaction-control statement as [`SqlError::Transaction`].
pub(crate) fn control_error(sql: &str, err: SqlError) -> SqlError {
    match err {
        SqlError::Exec { source, .. } => SqlError::Transaction(format!("{sql} failed: {source}")),
        other => other,
    }
}

async fn batch(client: &Object, sql: &str) -> Result<(), Failure> {
    Ok(client.batch_execute(sql).await?)
}

async fn held_execute(client: &Object, sql: &str, args: &[Value]) -> Result<u64, Failure> {
    Ok(client.execute(sql, &params(args)).await?)
}

async fn held_query(
    client: &Object,
    sql: &str,
    args: &[Value],
) -> Result<Vec<tokio_postgres::Row>, Failure> {
    Ok(client.query(sql, &params(args)).await?)
}

impl Executor for Transaction<'_> {
    async fn execute(&self, sql: &str, args: &[Value]) -> SqlResult<u64> {
        let client = self.client()?;
        self.conn
            .logger()
            .run(sql, args, |n: &u64| *n, held_execute(client, sql, args))
            .await
    }

    async fn query(&self, sql: &str, args: &[Value]) -> SqlResult<Rows> {
        let client = self.client()?;
        let rows = self
            .conn
            .logger()
            .run(sql, args, row_count, held_query(client, sql, args))
            .await?;
        Rows::from_pg(&rows)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        tracing::warn!(target: TARGET, "transaction dropped without commit or rollback; rolling back");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let result = client.batch_execute("ROLLBACK").await;
                    if let Err(err) = result {
                        tracing::error!(target: TARGET, error = %err, "rollback of dropped transaction failed");
                        drop(Object::take(client));
                    }
                });
            }
            // No runtime to roll back on: close the session instead of
            // returning it to the pool mid-transaction.
            Err(_) => drop(Object::take(client)),
        }
    }
}
