//! # pgfluent
//!
//! Injection-checked fluent SQL builders for PostgreSQL.
//!
//! ## Features
//!
//! - **Validated identifiers**: every table, column and expression passed to a
//!   builder is checked when it is set, and values only ever travel as `$n`
//!   parameters
//! - **One counter per statement**: `?` tokens in SET, WHERE and HAVING are
//!   numbered in clause order, however the clauses were accumulated
//! - **Pool or transaction**: builders are generic over [`Executor`], so the
//!   same code runs on a [`Connection`] or inside a [`Transaction`]
//! - **Reflection-free records**: rows are fed column by column into a
//!   [`Record`] callback
//! - **Statement logging**: `tracing` events under `pgfluent::sql`, with
//!   slow-query warnings
//!
//! ## Example
//!
//! ```ignore
//! use pgfluent::prelude::*;
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Record for User {
//!     fn scan(&mut self, column: &str, value: Value) -> Result<(), ScanError> {
//!         match column {
//!             "id" => self.id = value.get()?,
//!             "name" => self.name = value.get()?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let db = Connection::connect(ConnectionConfig::from_env()?)?;
//!
//! let adults = db
//!     .select()
//!     .table("users")?
//!     .where_("age >= ?", [18])
//!     .order_by("name")?
//!     .scan_all(User::default)
//!     .await?;
//!
//! let tx = db.begin().await?;
//! tx.update()
//!     .table("users")?
//!     .set("status", "active")?
//!     .where_in("id", adults.iter().map(|u| u.id))?
//!     .exec()
//!     .await?;
//! tx.commit().await?;
//! ```
//!
//! Validation is defense in depth, not a SQL parser. JOIN `ON` predicates and
//! raw condition templates are passed through as written.

pub mod builder;
pub mod clause;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod log;
pub mod pool;
pub mod prelude;
pub mod record;
pub mod render;
pub mod transaction;
pub mod validate;
pub mod value;

pub use builder::{Delete, Insert, JoinKind, Select, Update};
pub use clause::{Condition, Conditions, Filter};
pub use config::{ConnectionConfig, Recycling};
pub use connection::{Connection, PoolStats};
pub use error::{ScanError, SqlError, SqlResult};
pub use executor::Executor;
pub use log::StatementLogger;
pub use pool::{create_pool, create_pool_with_manager_config, create_pool_with_tls};
pub use record::{PartialScan, Record, Row, Rows, scan_all, scan_one};
pub use render::Rendered;
pub use transaction::{IsolationLevel, Transaction, TransactionOptions};
pub use validate::{
    validate_field_expression, validate_identifier, validate_table_expression, validate_table_name,
};
pub use value::{FromValue, IntoArgs, Value};
