//! Fluent statement builders.
//!
//! Builders are created from any [`Executor`](crate::Executor), the pool or a
//! transaction, take `self` by value, and are consumed by exactly one terminal
//! operation. Every setter that takes a table, column or expression validates
//! it immediately and returns the failure from the setter; values never appear
//! in SQL text.
//!
//! ```ignore
//! use pgfluent::prelude::*;
//!
//! let users = db
//!     .select()
//!     .table("users")?
//!     .select(&["id", "name"])?
//!     .where_("status = ?", ["active"])
//!     .order_by_desc("created_at")?
//!     .limit(20)
//!     .scan_all(User::default)
//!     .await?;
//!
//! db.insert()
//!     .table("users")?
//!     .columns(&["name", "email"])?
//!     .values(("alice", "alice@example.com"))
//!     .exec()
//!     .await?;
//!
//! db.update()
//!     .table("users")?
//!     .set("status", "inactive")?
//!     .where_eq("id", 7)?
//!     .exec()
//!     .await?;
//!
//! db.delete()
//!     .table("sessions")?
//!     .where_("expires_at < now()", ())
//!     .exec()
//!     .await?;
//! ```

mod delete;
mod insert;
mod select;
mod update;

pub use delete::Delete;
pub use insert::Insert;
pub use select::{JoinKind, Select};
pub use update::Update;

use crate::error::{SqlError, SqlResult};

fn require_table(table: &Option<String>) -> SqlResult<&str> {
    table.as_deref().ok_or(SqlError::MissingTable)
}

/// Collapse runs of whitespace in a validated table expression.
fn normalize(expr: &str) -> String {
    expr.split_whitespace().collect::<Vec<_>>().join(" ")
}
